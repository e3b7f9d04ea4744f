#![allow(dead_code)]

use adtrack::{
    Marketplace, MarketplaceError, SearchPage, SearchRequest, StoreLayout, Tracker, TrackerConfig,
};
use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn setup_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(anyhow::Error::from)
}

#[derive(Default)]
struct State {
    pages: HashMap<(String, u32), Vec<Value>>,
    failing_pages: HashSet<u32>,
    payloads: HashMap<String, Value>,
    failing_fetches: HashSet<String>,
    searches: Vec<SearchRequest>,
    fetches: Vec<String>,
}

/// In-memory marketplace; clones share state so a test can keep a handle
/// after moving one into a tracker
#[derive(Clone, Default)]
pub struct FakeMarketplace {
    state: Arc<Mutex<State>>,
}

impl FakeMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw search items (as the API would send them) for one page of a query
    pub fn add_page(&self, query: &str, page: u32, items: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert((query.to_string(), page), items);
    }

    pub fn fail_page(&self, page: u32) {
        self.state.lock().unwrap().failing_pages.insert(page);
    }

    pub fn add_payload(&self, item_id: &str, payload: Value) {
        self.state
            .lock()
            .unwrap()
            .payloads
            .insert(item_id.to_string(), payload);
    }

    pub fn fail_fetch(&self, item_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_fetches
            .insert(item_id.to_string());
    }

    pub fn heal_fetch(&self, item_id: &str) {
        self.state.lock().unwrap().failing_fetches.remove(item_id);
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }
}

impl Marketplace for FakeMarketplace {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, MarketplaceError> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(request.clone());

        if state.failing_pages.contains(&request.page) {
            return Err(MarketplaceError::Status {
                status: 503,
                url: format!("/search?page={}", request.page),
            });
        }

        let raw = state
            .pages
            .get(&(request.keywords.clone(), request.page))
            .cloned()
            .unwrap_or_default();
        Ok(SearchPage::new(raw))
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Option<Value>, MarketplaceError> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push(item_id.to_string());

        if state.failing_fetches.contains(item_id) {
            return Err(MarketplaceError::Status {
                status: 500,
                url: format!("/items/{}", item_id),
            });
        }
        Ok(state.payloads.get(item_id).cloned())
    }
}

pub fn tracker(
    dir: &Path,
    market: &FakeMarketplace,
    config: TrackerConfig,
) -> Tracker<FakeMarketplace> {
    Tracker::new(StoreLayout::new(dir), market.clone(), config)
}

/// Parse a store file into a JSON value
pub fn read_json(path: &Path) -> Result<Value> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}
