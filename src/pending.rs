//! Expired listings whose final fetch failed, kept for a bounded number of retries
use crate::store::{Entries, ObjectStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One listing waiting for another fetch-by-id attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    /// Store name of the shard the listing expired from
    pub shard: String,
    pub expiry: Value,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Typed view over the pending ledger file
pub struct PendingStore {
    store: ObjectStore,
}

impl PendingStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            store: ObjectStore::open(path)?,
        })
    }

    /// All entries, in file order
    pub fn load(&self) -> Result<Vec<(String, PendingEntry)>> {
        self.store
            .load()?
            .into_iter()
            .map(|(id, value)| {
                let entry: PendingEntry = serde_json::from_value(value).with_context(|| {
                    format!(
                        "Malformed pending entry {:?} in {}",
                        id,
                        self.store.path().display()
                    )
                })?;
                Ok((id, entry))
            })
            .collect()
    }

    /// Entries that expired out of the given shard
    pub fn for_shard(&self, shard: &str) -> Result<Vec<(String, PendingEntry)>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|(_, entry)| entry.shard == shard)
            .collect())
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.store.load()?.keys().cloned().collect())
    }

    /// Apply a finalize round: upsert `retry`, drop `resolved`
    pub fn update(&self, retry: &[(String, PendingEntry)], resolved: &[String]) -> Result<()> {
        if retry.is_empty() && resolved.is_empty() {
            return Ok(());
        }

        let mut entries: Entries = self.store.load()?;
        for id in resolved {
            entries.shift_remove(id);
        }
        for (id, entry) in retry {
            let value = serde_json::to_value(entry).context("Failed to serialize pending entry")?;
            entries.insert(id.clone(), value);
        }
        self.store.save(&entries)
    }

    pub fn len(&self) -> Result<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }
}
