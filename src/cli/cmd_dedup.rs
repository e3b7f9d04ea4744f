use adtrack::{StoreLayout, reconcile};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Remove listings that appear in more than one shard",
    long_about = "Scan every shard in the active directory. Ids found in more than one\n\
                  shard are removed from all of them and recorded in duplicates.json.",
    help_template = crate::clap_help!(
        examples: "  {bin} dedup\n  \
                   {bin} -C /data/ads dedup"
    )
)]
pub struct DedupCommand {}

pub fn run(_cmd: DedupCommand, dir: PathBuf, quiet: bool) -> Result<()> {
    let layout = StoreLayout::new(dir);
    let report = reconcile(&layout.active_dir())?;

    if !quiet {
        println!(
            "Scanned {} shard(s): {} duplicate id(s), {} entries removed, {} added to {}",
            report.shards_scanned,
            report.duplicates_found,
            report.entries_removed,
            report.ledger_added,
            layout.ledger_path().display()
        );
    }
    Ok(())
}
