// src/lib.rs
//! Track marketplace listings from search results to their archived final state.
//!
//! Each query feeds a shard of active listings (`active/<name>.json`, id to end
//! time). A cycle ingests a bounded number of search pages, removes ids found in
//! more than one shard, and moves every listing whose end time has passed into
//! the global archive (`final/archive.json`) with its full payload.

pub mod client;
pub mod constants;
pub mod dedup;
pub mod expiry;
pub mod layout;
pub mod marketplace;
pub mod options;
pub mod pending;
pub mod records;
pub mod store;
pub mod tracker;

pub use client::HttpMarketplace;
pub use dedup::{DedupReport, reconcile};
pub use expiry::{ExpiryError, ExpiryStatus, evaluate, is_expired, is_expired_at, parse_expiry};
pub use layout::{CleanPreview, CleanResult, StoreLayout};
pub use marketplace::{
    Marketplace, MarketplaceError, SearchFilters, SearchItem, SearchPage, SearchRequest,
};
pub use options::{QuerySpec, TrackerConfig, TrackerConfigBuilder, load_queries};
pub use pending::{PendingEntry, PendingStore};
pub use records::{ActiveRecord, FinalRecord};
pub use store::{Entries, ObjectStore, merge};
pub use tracker::{CycleEvent, CycleReport, Tracker};
