use adtrack::dedup::shard_files;
use adtrack::{ObjectStore, PendingStore, StoreLayout, evaluate};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::utils;

#[derive(Args)]
#[command(
    about = "Show shard, archive and ledger sizes",
    alias = "info",
    help_template = crate::clap_help!(
        examples: "  # Human-readable overview\n  \
                   {bin} status\n\n  \
                   # JSON output for scripting\n  \
                   {bin} status --json"
    )
)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ShardStatus {
    name: String,
    records: usize,
    expired: usize,
    unknown_expiry: usize,
}

#[derive(Debug, Serialize)]
struct Status {
    root: PathBuf,
    shards: Vec<ShardStatus>,
    archived: usize,
    duplicates: usize,
    pending: usize,
    dropped: usize,
}

pub fn run(cmd: StatusCommand, dir: PathBuf) -> Result<()> {
    let status = collect(&StoreLayout::new(&dir))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_human(&status, &dir);
    }
    Ok(())
}

/// Read-only: files that do not exist yet count as empty
fn collect(layout: &StoreLayout) -> Result<Status> {
    let now = Utc::now();
    let mut shards = Vec::new();

    for path in shard_files(&layout.active_dir())? {
        let entries = ObjectStore::open_existing(&path)?.load()?;
        let mut shard = ShardStatus {
            name: shard_name(&path),
            records: entries.len(),
            expired: 0,
            unknown_expiry: 0,
        };
        for value in entries.values() {
            match evaluate(value, now) {
                adtrack::ExpiryStatus::Expired => shard.expired += 1,
                adtrack::ExpiryStatus::Active => {}
                adtrack::ExpiryStatus::Unknown(_) => shard.unknown_expiry += 1,
            }
        }
        shards.push(shard);
    }

    let pending = if layout.pending_path().is_file() {
        PendingStore::open(layout.pending_path())?.len()?
    } else {
        0
    };

    Ok(Status {
        root: utils::display_path(layout.root()),
        shards,
        archived: count_if_exists(&layout.archive_path())?,
        duplicates: count_if_exists(&layout.ledger_path())?,
        pending,
        dropped: count_if_exists(&layout.dropped_path())?,
    })
}

fn count_if_exists(path: &Path) -> Result<usize> {
    if !path.is_file() {
        return Ok(0);
    }
    ObjectStore::open_existing(path)?.len()
}

fn shard_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_human(status: &Status, dir: &Path) {
    println!("Store: {}", utils::display_path(dir).display());
    println!();

    if status.shards.is_empty() {
        println!("  No shards yet");
    } else {
        println!("  {:<24} {:>8} {:>8} {:>8}", "Shard", "Records", "Expired", "Unknown");
        for shard in &status.shards {
            println!(
                "  {:<24} {:>8} {:>8} {:>8}",
                shard.name, shard.records, shard.expired, shard.unknown_expiry
            );
        }
    }

    println!();
    println!("  Archived:        {}", status.archived);
    println!("  Duplicates:      {}", status.duplicates);
    println!("  Pending retry:   {}", status.pending);
    println!("  Dropped:         {}", status.dropped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_collect_counts() {
        let tmp = TempDir::new().unwrap();
        let layout = StoreLayout::new(tmp.path());
        layout.init().unwrap();
        std::fs::write(
            layout.active_dir().join("Widget.json"),
            json!({"1": "2001-01-01T00:00:00Z", "2": "2999-01-01T00:00:00Z", "3": null})
                .to_string(),
        )
        .unwrap();
        std::fs::write(layout.archive_path(), json!({"9": {}}).to_string()).unwrap();

        let status = collect(&layout).unwrap();
        assert_eq!(status.shards.len(), 1);
        assert_eq!(status.shards[0].name, "Widget");
        assert_eq!(status.shards[0].records, 3);
        assert_eq!(status.shards[0].expired, 1);
        assert_eq!(status.shards[0].unknown_expiry, 1);
        assert_eq!(status.archived, 1);
        assert_eq!(status.duplicates, 0);
        assert_eq!(status.pending, 0);
        assert_eq!(status.dropped, 0);
    }
}
