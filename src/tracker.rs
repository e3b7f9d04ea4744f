// Tracker module - ingest, dedup, expire and archive one query at a time
use crate::dedup::{self, DedupReport};
use crate::expiry::{self, ExpiryStatus};
use crate::layout::StoreLayout;
use crate::marketplace::{Marketplace, SearchRequest};
use crate::options::{QuerySpec, TrackerConfig};
use crate::pending::{PendingEntry, PendingStore};
use crate::records::FinalRecord;
use crate::store::ObjectStore;
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

// ============================================================================
// Cycle Events
// ============================================================================

#[derive(Debug, Clone)]
pub enum CycleEvent {
    PageFetched {
        page: u32,
        items: usize,
        written: usize,
        malformed: usize,
    },
    PageFailed {
        page: u32,
        error: String,
    },
    ItemFinalized {
        item_id: String,
    },
    ItemDeferred {
        item_id: String,
        attempts: u32,
        error: String,
    },
    ItemDropped {
        item_id: String,
        attempts: u32,
    },
    Deduplicated {
        report: DedupReport,
    },
    CycleComplete {
        report: CycleReport,
    },
}

/// Counters for one query's cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub name: String,
    pub shard_path: PathBuf,
    pub archive_path: PathBuf,
    /// New records written to the shard
    pub ingested: usize,
    /// Entries removed by dedup across the whole active directory
    pub deduplicated: usize,
    /// New records written to the archive
    pub finalized: usize,
    /// Expired listings moved to (or kept in) the pending ledger
    pub deferred: usize,
    /// Expired listings given up on after the last allowed attempt, recorded
    /// in the dropped ledger
    pub dropped: usize,
    /// Shard records whose expiry could not be read
    pub unparseable: usize,
    /// Search results skipped because they could not be read as listings
    pub malformed: usize,
    pub pages_failed: usize,
}

#[derive(Default)]
struct Ingested {
    written: usize,
    malformed: usize,
    pages_failed: usize,
}

/// An expired listing about to be fetched by id
struct Candidate {
    item_id: String,
    expiry: Value,
    attempts: u32,
}

#[derive(Default)]
struct Finalized {
    archived: Vec<FinalRecord>,
    retry: Vec<(String, PendingEntry)>,
    given_up: Vec<(String, PendingEntry)>,
    resolved: Vec<String>,
    expired_ids: Vec<String>,
    deferred: usize,
    dropped: usize,
    unparseable: usize,
}

// ============================================================================
// Tracker
// ============================================================================

pub struct Tracker<M: Marketplace> {
    layout: StoreLayout,
    marketplace: M,
    config: TrackerConfig,
    event_callback: Option<Box<dyn Fn(&CycleEvent) + Send + Sync>>,
}

impl<M: Marketplace> Tracker<M> {
    pub fn new(layout: StoreLayout, marketplace: M, config: TrackerConfig) -> Self {
        Self {
            layout,
            marketplace,
            config,
            event_callback: None,
        }
    }

    /// Receive every cycle event (progress output, tests)
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CycleEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Box::new(callback));
        self
    }

    fn handle_event(&self, event: &CycleEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event);
        }
    }

    /// Run one full cycle for `query`, feeding the shard called `name`.
    ///
    /// Collaborator failures are logged and counted; filesystem errors abort
    /// this cycle and are returned.
    pub async fn run_cycle(&self, query: &str, name: &str) -> Result<CycleReport> {
        self.layout.init()?;
        let shard = ObjectStore::open(self.layout.shard_path(name)?)?;
        let archive = ObjectStore::open(self.layout.archive_path())?;
        let pending = PendingStore::open(self.layout.pending_path())?;
        let dropped = ObjectStore::open(self.layout.dropped_path())?;

        let mut report = CycleReport {
            name: name.to_string(),
            shard_path: shard.path().to_path_buf(),
            archive_path: archive.path().to_path_buf(),
            ..Default::default()
        };

        info!("Tracking {:?} into {}", query, shard.path().display());

        let ingested = self
            .ingest(query, &shard, &archive, &pending, &dropped)
            .await?;
        report.ingested = ingested.written;
        report.malformed = ingested.malformed;
        report.pages_failed = ingested.pages_failed;

        let dedup_report = dedup::reconcile(&self.layout.active_dir())?;
        report.deduplicated = dedup_report.entries_removed;
        self.handle_event(&CycleEvent::Deduplicated {
            report: dedup_report,
        });

        let outcome = self.finalize(name, &shard, &archive, &pending).await?;
        report.deferred = outcome.deferred;
        report.dropped = outcome.dropped;
        report.unparseable = outcome.unparseable;

        // Archive and dropped ledger first, then the pending ledger, then the shard
        report.finalized =
            archive.merge(outcome.archived.into_iter().map(FinalRecord::into_entry))?;
        dropped.merge(dropped_entries(outcome.given_up)?)?;
        pending.update(&outcome.retry, &outcome.resolved)?;
        shard.remove(outcome.expired_ids.iter().map(String::as_str))?;

        info!(
            "{}: {} ingested, {} finalized, {} deferred, {} dropped",
            name, report.ingested, report.finalized, report.deferred, report.dropped
        );
        self.handle_event(&CycleEvent::CycleComplete {
            report: report.clone(),
        });

        Ok(report)
    }

    /// Run every query in order; one failing cycle never stops the rest
    pub async fn run_batch(&self, queries: &[QuerySpec]) -> Vec<(String, Result<CycleReport>)> {
        let mut results = Vec::with_capacity(queries.len());
        for spec in queries {
            let result = self.run_cycle(&spec.query, &spec.name).await;
            if let Err(e) = &result {
                warn!("Cycle for {} failed: {:#}", spec.name, e);
            }
            results.push((spec.name.clone(), result));
        }
        results
    }

    /// Fetch the page budget and merge new listings into the shard.
    /// A failed page or an unreadable item is skipped and counted.
    async fn ingest(
        &self,
        query: &str,
        shard: &ObjectStore,
        archive: &ObjectStore,
        pending: &PendingStore,
        dropped: &ObjectStore,
    ) -> Result<Ingested> {
        // Listings in a terminal or pending state are never tracked again
        let mut settled: HashSet<String> = archive.load()?.keys().cloned().collect();
        settled.extend(pending.ids()?);
        settled.extend(dropped.load()?.keys().cloned());
        settled.extend(ObjectStore::open(self.layout.ledger_path())?.load()?.keys().cloned());

        let mut stats = Ingested::default();

        for page in 0..self.config.page_budget {
            let request =
                SearchRequest::new(query, page, self.config.page_size, &self.config.filters);

            let (items, malformed) = match self.marketplace.search(&request).await {
                Ok(search_page) => search_page.parse_items(),
                Err(e) => {
                    warn!("Search page {} for {:?} failed: {}", page, query, e);
                    stats.pages_failed += 1;
                    self.handle_event(&CycleEvent::PageFailed {
                        page,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for (index, e) in &malformed {
                warn!(
                    "Skipping unreadable item {} on page {} for {:?}: {}",
                    index, page, query, e
                );
            }
            stats.malformed += malformed.len();

            let records: Vec<(String, Value)> = items
                .iter()
                .filter(|item| !settled.contains(&item.item_id))
                .map(|item| item.to_active_record().into_entry())
                .collect();
            let page_written = shard.merge(records)?;
            stats.written += page_written;

            debug!(
                "page {}: {} item(s), {} new, {} unreadable",
                page,
                items.len(),
                page_written,
                malformed.len()
            );
            self.handle_event(&CycleEvent::PageFetched {
                page,
                items: items.len(),
                written: page_written,
                malformed: malformed.len(),
            });
        }

        Ok(stats)
    }

    /// Decide what happens to every expired listing of the shard and every
    /// pending listing that came from it. Nothing is written here.
    async fn finalize(
        &self,
        name: &str,
        shard: &ObjectStore,
        archive: &ObjectStore,
        pending: &PendingStore,
    ) -> Result<Finalized> {
        let mut out = Finalized::default();
        let now = Utc::now();
        let archived: HashSet<String> = archive.load()?.keys().cloned().collect();

        let mut candidates = Vec::new();
        let mut queued: HashSet<String> = HashSet::new();

        for (id, entry) in pending.for_shard(name)? {
            queued.insert(id.clone());
            candidates.push(Candidate {
                item_id: id,
                expiry: entry.expiry,
                attempts: entry.attempts,
            });
        }

        for (id, value) in shard.load()? {
            match expiry::evaluate(&value, now) {
                ExpiryStatus::Expired => {
                    out.expired_ids.push(id.clone());
                    if !queued.insert(id.clone()) {
                        continue;
                    }
                    candidates.push(Candidate {
                        item_id: id,
                        expiry: value,
                        attempts: 0,
                    });
                }
                ExpiryStatus::Active => {}
                ExpiryStatus::Unknown(reason) => {
                    warn!("{}: listing {} has no usable end time: {}", name, id, reason);
                    out.unparseable += 1;
                }
            }
        }

        for candidate in candidates {
            if archived.contains(&candidate.item_id) {
                out.resolved.push(candidate.item_id);
                continue;
            }

            let error = match self.marketplace.fetch_item(&candidate.item_id).await {
                Ok(Some(payload)) => {
                    self.handle_event(&CycleEvent::ItemFinalized {
                        item_id: candidate.item_id.clone(),
                    });
                    out.resolved.push(candidate.item_id.clone());
                    out.archived.push(FinalRecord::new(candidate.item_id, payload));
                    continue;
                }
                Ok(None) => "listing unavailable".to_string(),
                Err(e) => e.to_string(),
            };

            let attempts = candidate.attempts + 1;
            if attempts >= self.config.max_finalize_attempts {
                warn!(
                    "Giving up on listing {} after {} attempt(s): {}",
                    candidate.item_id, attempts, error
                );
                out.dropped += 1;
                self.handle_event(&CycleEvent::ItemDropped {
                    item_id: candidate.item_id.clone(),
                    attempts,
                });
                out.resolved.push(candidate.item_id.clone());
                out.given_up.push((
                    candidate.item_id,
                    PendingEntry {
                        shard: name.to_string(),
                        expiry: candidate.expiry,
                        attempts,
                        last_error: Some(error),
                    },
                ));
            } else {
                debug!(
                    "Deferring listing {} (attempt {}/{}): {}",
                    candidate.item_id, attempts, self.config.max_finalize_attempts, error
                );
                out.deferred += 1;
                self.handle_event(&CycleEvent::ItemDeferred {
                    item_id: candidate.item_id.clone(),
                    attempts,
                    error: error.clone(),
                });
                out.retry.push((
                    candidate.item_id,
                    PendingEntry {
                        shard: name.to_string(),
                        expiry: candidate.expiry,
                        attempts,
                        last_error: Some(error),
                    },
                ));
            }
        }

        Ok(out)
    }
}

fn dropped_entries(given_up: Vec<(String, PendingEntry)>) -> Result<Vec<(String, Value)>> {
    given_up
        .into_iter()
        .map(|(id, entry)| {
            let value = serde_json::to_value(entry).context("Failed to serialize dropped entry")?;
            Ok((id, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::{MarketplaceError, SearchPage};
    use crate::options::TrackerConfigBuilder;
    use serde_json::json;
    use tempfile::TempDir;

    /// One page of fixed raw items; every fetch returns a small payload
    struct OnePage(Vec<Value>);

    impl Marketplace for OnePage {
        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, MarketplaceError> {
            let items = if request.page == 0 { self.0.clone() } else { Vec::new() };
            Ok(SearchPage::new(items))
        }

        async fn fetch_item(&self, item_id: &str) -> Result<Option<Value>, MarketplaceError> {
            Ok(Some(json!({"ItemID": item_id})))
        }
    }

    fn item(id: &str, end: Option<&str>) -> Value {
        let mut raw = json!({"itemId": id});
        if let Some(end) = end {
            raw["listingInfo"] = json!({"endTime": end});
        }
        raw
    }

    #[tokio::test]
    async fn test_cycle_keeps_active_and_counts_unparseable() -> Result<()> {
        let tmp = TempDir::new()?;
        let market = OnePage(vec![
            item("1", Some("2999-01-01T00:00:00Z")),
            item("2", None),
            item("3", Some("yesterday")),
            item("4", Some("2001-01-01T00:00:00Z")),
        ]);
        let config = TrackerConfigBuilder::new().page_budget(2).build();
        let tracker = Tracker::new(StoreLayout::new(tmp.path()), market, config);

        let report = tracker.run_cycle("widget", "widgets").await?;

        assert_eq!(report.ingested, 4);
        assert_eq!(report.finalized, 1);
        assert_eq!(report.unparseable, 2);
        let shard = ObjectStore::open(tmp.path().join("active/widgets.json"))?.load()?;
        assert_eq!(
            serde_json::Value::Object(shard),
            json!({"1": "2999-01-01T00:00:00Z", "2": null, "3": "yesterday"})
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_item_does_not_lose_page() -> Result<()> {
        let tmp = TempDir::new()?;
        let market = OnePage(vec![
            item("1", Some("2999-01-01T00:00:00Z")),
            json!({"itemId": "2", "endTime": 1577836800}),
            json!({"title": "no id"}),
            item("4", Some("2999-06-01T00:00:00Z")),
        ]);
        let config = TrackerConfigBuilder::new().page_budget(1).build();
        let tracker = Tracker::new(StoreLayout::new(tmp.path()), market, config);

        let report = tracker.run_cycle("widget", "widgets").await?;

        assert_eq!(report.ingested, 3);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.unparseable, 1);
        assert_eq!(report.pages_failed, 0);
        let shard = ObjectStore::open(tmp.path().join("active/widgets.json"))?.load()?;
        assert_eq!(
            serde_json::Value::Object(shard),
            json!({
                "1": "2999-01-01T00:00:00Z",
                "2": 1577836800,
                "4": "2999-06-01T00:00:00Z"
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_events_reach_callback() -> Result<()> {
        use std::sync::{Arc, Mutex};

        let tmp = TempDir::new()?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = TrackerConfigBuilder::new().page_budget(3).build();
        let tracker = Tracker::new(StoreLayout::new(tmp.path()), OnePage(vec![]), config)
            .with_callback(move |event| {
                let tag = match event {
                    CycleEvent::PageFetched { .. } => "page",
                    CycleEvent::Deduplicated { .. } => "dedup",
                    CycleEvent::CycleComplete { .. } => "done",
                    _ => "other",
                };
                sink.lock().unwrap().push(tag);
            });

        tracker.run_cycle("x", "x").await?;
        assert_eq!(*seen.lock().unwrap(), vec!["page", "page", "page", "dedup", "done"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_name_fails_cycle() {
        let tmp = TempDir::new().unwrap();
        let tracker = Tracker::new(
            StoreLayout::new(tmp.path()),
            OnePage(vec![]),
            TrackerConfig::default(),
        );
        assert!(tracker.run_cycle("x", "duplicates").await.is_err());
    }
}
