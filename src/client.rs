// Marketplace client - HTTP implementation of the search and fetch-by-id collaborator
use crate::constants;
use crate::marketplace::{ItemEnvelope, Marketplace, MarketplaceError, SearchPage, SearchRequest};
use log::{debug, warn};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// HTTP client for the marketplace API with request pacing and retry logic
pub struct HttpMarketplace {
    client: reqwest::Client,
    base_url: Url,
    max_retries: usize,
    pacer: Pacer,
}

impl HttpMarketplace {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, MarketplaceError> {
        let raw = base_url.as_ref();
        let base_url = Url::parse(raw)
            .map_err(|e| MarketplaceError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MarketplaceError::InvalidUrl(raw.to_string()));
        }

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
                .user_agent(constants::user_agent())
                .build()?,
            base_url,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            pacer: Pacer::new(Duration::from_millis(constants::MIN_REQUEST_INTERVAL_MS)),
        })
    }

    /// Attempts per request, first try included (at least 1)
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// `{base}/<segments>`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, MarketplaceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MarketplaceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url` with retries; `Ok(None)` for 404/410
    async fn get_with_retry(
        &self,
        url: &Url,
        query: &[(&'static str, String)],
    ) -> Result<Option<String>, MarketplaceError> {
        let mut backoff = Duration::from_millis(constants::INITIAL_BACKOFF_MS);
        let mut attempt = 1;

        loop {
            self.pacer.wait().await;

            let err = match self.do_get(url, query).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                return Err(MarketplaceError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            if let MarketplaceError::RateLimited(retry_after) = err {
                warn!(
                    "Rate limited by marketplace, waiting {:?} before retry {}/{}",
                    retry_after, attempt, self.max_retries
                );
                tokio::time::sleep(retry_after).await;
            } else {
                warn!(
                    "Request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt, self.max_retries, err, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            attempt += 1;
        }
    }

    async fn do_get(
        &self,
        url: &Url,
        query: &[(&'static str, String)],
    ) -> Result<Option<String>, MarketplaceError> {
        debug!("GET {} {:?}", url, query);
        let response = self.client.get(url.clone()).query(query).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketplaceError::RateLimited(parse_retry_after(&response)));
        }

        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(MarketplaceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(Some(response.text().await?))
    }
}

impl Marketplace for HttpMarketplace {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, MarketplaceError> {
        let url = self.endpoint(&["search"])?;
        let Some(body) = self.get_with_retry(&url, &request.query_pairs()).await? else {
            return Err(MarketplaceError::Status {
                status: reqwest::StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            });
        };
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Option<Value>, MarketplaceError> {
        let url = self.endpoint(&["items", item_id])?;
        match self.get_with_retry(&url, &[]).await? {
            Some(body) => {
                let envelope: ItemEnvelope = serde_json::from_str(&body)?;
                Ok(envelope.item)
            }
            None => Ok(None),
        }
    }
}

/// Parse the Retry-After header from a response
/// Returns the duration to wait before retrying, capped at MAX_RETRY_AFTER_SECS
fn parse_retry_after(response: &reqwest::Response) -> Duration {
    let header = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok());
    retry_after_from_header(header, std::time::SystemTime::now())
}

fn retry_after_from_header(header: Option<&str>, now: std::time::SystemTime) -> Duration {
    let max = Duration::from_secs(constants::MAX_RETRY_AFTER_SECS);

    if let Some(value) = header {
        // Seconds (most common)
        if let Ok(seconds) = value.trim().parse::<u64>() {
            return Duration::from_secs(seconds).min(max);
        }

        // HTTP date (RFC 7231)
        if let Ok(at) = httpdate::parse_http_date(value) {
            if let Ok(duration) = at.duration_since(now) {
                return duration.min(max);
            }
            return Duration::ZERO;
        }
    }

    max
}

/// Keeps consecutive requests at least `interval` apart
struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
