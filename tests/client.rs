use adtrack::{HttpMarketplace, Marketplace, MarketplaceError, SearchFilters, SearchRequest};
use anyhow::Result;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One canned HTTP response
struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

/// Local HTTP server that answers requests with queued replies in order
/// and records each request target
struct StubServer {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    async fn start(replies: Vec<Reply>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(Mutex::new(VecDeque::from(replies)));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let reply = queue
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Reply::status(500));
                answer(socket, reply, &seen).await;
            }
        });

        Ok(Self { url, requests })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn client(&self) -> HttpMarketplace {
        HttpMarketplace::new(&self.url).unwrap()
    }
}

async fn answer(mut socket: TcpStream, reply: Reply, seen: &Mutex<Vec<String>>) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }

    let target = String::from_utf8_lossy(&head)
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    seen.lock().unwrap().push(target);

    let mut response = format!("HTTP/1.1 {} Stub\r\n", reply.status);
    response.push_str("Content-Type: application/json\r\n");
    response.push_str(&format!("Content-Length: {}\r\n", reply.body.len()));
    response.push_str("Connection: close\r\n");
    for (name, value) in &reply.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&reply.body);

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn request(keywords: &str, page: u32) -> SearchRequest {
    SearchRequest::new(keywords, page, 50, &SearchFilters::default())
}

#[tokio::test]
async fn test_fetch_item_unwraps_envelope() -> Result<()> {
    let server = StubServer::start(vec![Reply::json(
        200,
        json!({"Item": {"ItemID": "5", "Title": "Widget"}}),
    )])
    .await?;

    let payload = server.client().fetch_item("5").await?;

    assert_eq!(payload, Some(json!({"ItemID": "5", "Title": "Widget"})));
    assert_eq!(server.requests(), vec!["/items/5".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_fetch_item_missing_or_gone_is_none() -> Result<()> {
    let server = StubServer::start(vec![Reply::status(404), Reply::status(410)]).await?;
    let client = server.client().with_max_retries(1);

    assert_eq!(client.fetch_item("1").await?, None);
    assert_eq!(client.fetch_item("2").await?, None);
    assert_eq!(server.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_fetch_item_escapes_id() -> Result<()> {
    let server = StubServer::start(vec![Reply::json(200, json!({"Item": {}}))]).await?;

    server.client().fetch_item("a/b?c").await?;

    assert_eq!(server.requests(), vec!["/items/a%2Fb%3Fc".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_search_sends_query_and_keeps_raw_items() -> Result<()> {
    let server = StubServer::start(vec![Reply::json(
        200,
        json!({"items": [
            {"itemId": "1", "endTime": "2999-01-01T00:00:00"},
            {"itemId": "2", "endTime": 1577836800},
            {"title": "no id"}
        ]}),
    )])
    .await?;

    let filters = SearchFilters {
        category_id: Some("9355".to_string()),
        located_in: None,
    };
    let page = server
        .client()
        .search(&SearchRequest::new("Iphone 7", 2, 50, &filters))
        .await?;

    assert_eq!(page.items.len(), 3);
    let (items, malformed) = page.parse_items();
    assert_eq!(items.len(), 2);
    assert_eq!(malformed.len(), 1);

    let requests = server.requests();
    let target = &requests[0];
    assert!(target.starts_with("/search?"), "{}", target);
    assert!(target.contains("keywords=Iphone+7"), "{}", target);
    assert!(target.contains("page=2"), "{}", target);
    assert!(target.contains("perPage=50"), "{}", target);
    assert!(target.contains("categoryId=9355"), "{}", target);
    assert!(!target.contains("locatedIn"), "{}", target);
    Ok(())
}

#[tokio::test]
async fn test_search_not_found_is_an_error() -> Result<()> {
    let server = StubServer::start(vec![Reply::status(404)]).await?;

    let result = server.client().with_max_retries(1).search(&request("x", 0)).await;

    assert!(
        matches!(result, Err(MarketplaceError::Status { status: 404, .. })),
        "{:?}",
        result
    );
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_waits_for_retry_after() -> Result<()> {
    let server = StubServer::start(vec![
        Reply::status(429).header("Retry-After", "1"),
        Reply::json(200, json!({"items": []})),
    ])
    .await?;

    let start = Instant::now();
    let page = server.client().search(&request("x", 0)).await?;

    assert!(page.items.is_empty());
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(server.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_server_errors_back_off_then_give_up() -> Result<()> {
    let server = StubServer::start(vec![Reply::status(500), Reply::status(503)]).await?;

    let start = Instant::now();
    let result = server.client().with_max_retries(2).search(&request("x", 0)).await;

    match result {
        Err(MarketplaceError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, MarketplaceError::Status { status: 503, .. }));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(server.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() -> Result<()> {
    let server = StubServer::start(vec![Reply {
        status: 200,
        headers: Vec::new(),
        body: "not json".to_string(),
    }])
    .await?;

    let result = server.client().fetch_item("1").await;

    assert!(matches!(result, Err(MarketplaceError::Decode(_))), "{:?}", result);
    Ok(())
}
