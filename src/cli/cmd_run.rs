use super::utils::{self, ApiArgs};
use adtrack::{CycleEvent, CycleReport};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Run one tracking cycle for a search query",
    long_about = "Search the marketplace for QUERY, add new listings to the shard NAME,\n\
                  remove ids duplicated across shards, then archive every listing\n\
                  whose end time has passed.",
    help_template = crate::clap_help!(
        examples: "  # Track one query into active/IPhone7.json\n  \
                   {bin} run \"Iphone 7\" --name IPhone7\n\n  \
                   # Only two pages, one category\n  \
                   {bin} run \"Iphone 7\" --name IPhone7 --pages 2 --category 9355"
    )
)]
pub struct RunCommand {
    /// Search keywords
    pub query: String,

    /// Shard name (file active/<NAME>.json)
    #[arg(short, long)]
    pub name: String,

    #[command(flatten)]
    pub api: ApiArgs,
}

pub fn run(cmd: RunCommand, dir: PathBuf, quiet: bool) -> Result<()> {
    let tracker = utils::create_tracker(&dir, &cmd.api)?.with_callback(move |event| {
        if quiet {
            return;
        }
        match event {
            CycleEvent::PageFailed { page, error } => {
                eprintln!("⚠ page {} failed: {}", page, error)
            }
            CycleEvent::ItemDropped { item_id, attempts } => {
                eprintln!("⚠ gave up on {} after {} attempt(s)", item_id, attempts)
            }
            _ => {}
        }
    });

    let report = tokio::runtime::Runtime::new()?
        .block_on(async { tracker.run_cycle(&cmd.query, &cmd.name).await })?;

    if !quiet {
        print_summary(&report);
    }
    Ok(())
}

/// The per-cycle summary lines shared with `batch`
pub fn summary_lines(report: &CycleReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} new {} added to {}",
            report.ingested,
            utils::plural_ads(report.ingested),
            report.shard_path.display()
        ),
        format!(
            "{} new {} added to {}",
            report.finalized,
            utils::plural_ads(report.finalized),
            report.archive_path.display()
        ),
    ];
    if report.deduplicated > 0 {
        lines.push(format!("{} duplicate entries removed", report.deduplicated));
    }
    if report.deferred > 0 || report.dropped > 0 {
        lines.push(format!(
            "{} deferred for retry, {} dropped",
            report.deferred, report.dropped
        ));
    }
    if report.pages_failed > 0 {
        lines.push(format!("{} search page(s) failed", report.pages_failed));
    }
    if report.malformed > 0 {
        lines.push(format!("{} unreadable search result(s) skipped", report.malformed));
    }
    lines
}

fn print_summary(report: &CycleReport) {
    for line in summary_lines(report) {
        println!("{}", line);
    }
}
