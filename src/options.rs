use crate::constants;
use crate::marketplace::SearchFilters;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

/// Settings for one tracker, shared by every cycle it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Search pages fetched per cycle
    pub page_budget: u32,
    /// Items requested per page
    pub page_size: u32,
    /// Filters sent with every search
    pub filters: SearchFilters,
    /// Fetch attempts before an expired listing is given up on
    pub max_finalize_attempts: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            page_budget: constants::DEFAULT_PAGE_BUDGET,
            page_size: constants::DEFAULT_PAGE_SIZE,
            filters: SearchFilters::default(),
            max_finalize_attempts: constants::DEFAULT_MAX_FINALIZE_ATTEMPTS,
        }
    }
}

/// Builder for TrackerConfig
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    pub fn page_budget(mut self, pages: u32) -> Self {
        self.config.page_budget = pages;
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size.max(1);
        self
    }

    pub fn category_id<S: Into<String>>(mut self, category: S) -> Self {
        self.config.filters.category_id = Some(category.into());
        self
    }

    pub fn located_in<S: Into<String>>(mut self, location: S) -> Self {
        self.config.filters.located_in = Some(location.into());
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.config.filters = filters;
        self
    }

    pub fn max_finalize_attempts(mut self, attempts: u32) -> Self {
        self.config.max_finalize_attempts = attempts.max(1);
        self
    }

    pub fn build(self) -> TrackerConfig {
        self.config
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of a batch file: search keywords and the shard they feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    pub name: String,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            name: name.into(),
        }
    }
}

/// Read a batch file: a JSON array of `{"query": ..., "name": ...}`
///
/// Names are not validated here; `Tracker::run_batch` reports a bad name as
/// that entry's own failure and still runs the others.
pub fn load_queries(path: &Path) -> Result<Vec<QuerySpec>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read query list: {}", path.display()))?;
    let queries: Vec<QuerySpec> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse query list: {}", path.display()))?;

    if queries.is_empty() {
        bail!("query list {} is empty", path.display());
    }

    Ok(queries)
}
