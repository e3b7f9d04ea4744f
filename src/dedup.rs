//! Cross-shard duplicate reconciliation with an append-only duplicate ledger
// src/dedup.rs
use crate::constants;
use crate::store::{self, Entries, ObjectStore};
use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub shards_scanned: usize,
    /// Distinct ids found in more than one shard during this pass
    pub duplicates_found: usize,
    /// Entries deleted across all shards (new duplicates and ledgered ids)
    pub entries_removed: usize,
    pub ledger_added: usize,
}

/// Whether `path` names a shard: `*.json`, not the ledger, not a temp file
pub fn is_shard_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.')
        && name != constants::LEDGER_FILE
        && path.extension().and_then(|e| e.to_str()) == Some(constants::STORE_EXTENSION)
}

/// Shard files in `dir`, sorted by file name
pub fn shard_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut shards = Vec::new();

    if !dir.exists() {
        return Ok(shards);
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_shard_file(&path) {
            shards.push(path);
        }
    }

    shards.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(shards)
}

/// Remove every id that appears in more than one shard of `dir`.
///
/// All shards are read before any is rewritten. A duplicated id is deleted
/// from every shard, including the one it was first seen in, and recorded in
/// the ledger with the value from the first shard in name order. Ids already
/// in the ledger are removed wherever they show up again.
pub fn reconcile(dir: &Path) -> Result<DedupReport> {
    let ledger = ObjectStore::open(dir.join(constants::LEDGER_FILE))?;
    let ledgered = ledger.load()?;

    // Pass 1: detect
    let mut shards: Vec<(ObjectStore, Entries)> = Vec::new();
    for path in shard_files(dir)? {
        let store = ObjectStore::open_existing(path)?;
        let entries = store.load()?;
        shards.push((store, entries));
    }

    let mut first_seen: HashSet<&str> = HashSet::new();
    let mut duplicates = Entries::new();
    for (_, entries) in &shards {
        for id in entries.keys() {
            if !first_seen.insert(id.as_str()) && !duplicates.contains_key(id) {
                duplicates.insert(id.clone(), first_value(&shards, id));
            }
        }
    }

    let mut report = DedupReport {
        shards_scanned: shards.len(),
        duplicates_found: duplicates.len(),
        ..Default::default()
    };

    // Ledger before shards: an interrupted pass is finished by the next one
    report.ledger_added = ledger.merge(
        duplicates
            .iter()
            .map(|(id, value)| (id.clone(), value.clone())),
    )?;

    // Pass 2: remove
    for (store, mut entries) in shards {
        let doomed: Vec<String> = entries
            .keys()
            .filter(|id| duplicates.contains_key(*id) || ledgered.contains_key(*id))
            .cloned()
            .collect();
        if doomed.is_empty() {
            continue;
        }

        let removed = store::remove_keys(&mut entries, doomed.iter().map(String::as_str));
        store.save(&entries)?;
        report.entries_removed += removed;
        debug!(
            "dedup: removed {} id(s) from {}",
            removed,
            store.path().display()
        );
    }

    if report.entries_removed > 0 || report.duplicates_found > 0 {
        info!(
            "dedup: {} duplicate id(s) in {} shard(s), {} entr(ies) removed, {} added to ledger",
            report.duplicates_found,
            report.shards_scanned,
            report.entries_removed,
            report.ledger_added
        );
    }

    Ok(report)
}

/// Value of `id` in the first shard (name order) that holds it
fn first_value(shards: &[(ObjectStore, Entries)], id: &str) -> Value {
    shards
        .iter()
        .find_map(|(_, entries)| entries.get(id).cloned())
        .unwrap_or(Value::Null)
}
