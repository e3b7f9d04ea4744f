//! Marketplace collaborator boundary: search and fetch-by-id
// src/marketplace.rs
use crate::records::ActiveRecord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// Filters applied to every search a tracker sends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub located_in: Option<String>,
}

/// Parameters of one search call, built fresh for every page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub keywords: String,
    pub page: u32,
    pub per_page: u32,
    pub filters: SearchFilters,
}

impl SearchRequest {
    pub fn new(
        keywords: impl Into<String>,
        page: u32,
        per_page: u32,
        filters: &SearchFilters,
    ) -> Self {
        Self {
            keywords: keywords.into(),
            page,
            per_page,
            filters: filters.clone(),
        }
    }

    /// Query-string pairs in the order they are sent
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("keywords", self.keywords.clone()),
            ("page", self.page.to_string()),
            ("perPage", self.per_page.to_string()),
        ];
        if let Some(category) = &self.filters.category_id {
            pairs.push(("categoryId", category.clone()));
        }
        if let Some(location) = &self.filters.located_in {
            pairs.push(("locatedIn", location.clone()));
        }
        pairs
    }
}

/// End times are kept as sent; the expiry check decides what is usable
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListingInfo {
    #[serde(rename = "endTime", default)]
    pub end_time: Option<Value>,
}

/// One listing from a search page; unknown fields are kept in `extra`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchItem {
    #[serde(rename = "itemId", deserialize_with = "string_or_number")]
    pub item_id: String,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<Value>,
    #[serde(rename = "listingInfo", default)]
    pub listing_info: Option<ListingInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchItem {
    /// End time from the top level, falling back to `listingInfo.endTime`
    pub fn expiry(&self) -> Option<&Value> {
        self.end_time
            .as_ref()
            .or_else(|| self.listing_info.as_ref()?.end_time.as_ref())
    }

    pub fn to_active_record(&self) -> ActiveRecord {
        ActiveRecord::new(
            self.item_id.clone(),
            self.expiry().cloned().unwrap_or(Value::Null),
        )
    }
}

/// Search response body.
///
/// Items stay raw so that one listing the tracker cannot read does not cost
/// the rest of the page; see [`SearchPage::parse_items`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<Value>,
}

impl SearchPage {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Readable items, and the position and error of every other one
    pub fn parse_items(&self) -> (Vec<SearchItem>, Vec<(usize, serde_json::Error)>) {
        let mut parsed = Vec::with_capacity(self.items.len());
        let mut malformed = Vec::new();
        for (index, raw) in self.items.iter().enumerate() {
            match SearchItem::deserialize(raw) {
                Ok(item) => parsed.push(item),
                Err(e) => malformed.push((index, e)),
            }
        }
        (parsed, malformed)
    }
}

/// Fetch-by-id response body; the payload is archived as-is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemEnvelope {
    #[serde(rename = "Item", default)]
    pub item: Option<Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<MarketplaceError>,
    },
    #[error("invalid marketplace URL {0:?}")]
    InvalidUrl(String),
}

/// The external listing API a tracker reads from
pub trait Marketplace {
    /// One page of listings matching the request
    fn search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<SearchPage, MarketplaceError>> + Send;

    /// Full listing payload, or `None` when the listing is gone
    fn fetch_item(
        &self,
        item_id: &str,
    ) -> impl Future<Output = Result<Option<Value>, MarketplaceError>> + Send;
}
