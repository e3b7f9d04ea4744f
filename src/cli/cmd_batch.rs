use super::cmd_run;
use super::progress::ProgressBar;
use super::utils::{self, ApiArgs};
use adtrack::{CycleEvent, load_queries};
use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Run a tracking cycle for every query in a list",
    long_about = "Read a JSON array of {\"query\": ..., \"name\": ...} entries and run one\n\
                  cycle per entry, in order. A failing query is reported and the rest\n\
                  still run; the exit status is non-zero if any of them failed.",
    help_template = crate::clap_help!(
        examples: "  # queries.json: [{\"query\": \"Iphone 7\", \"name\": \"IPhone7\"}]\n  \
                   {bin} batch queries.json\n\n  \
                   # Against a different API\n  \
                   {bin} batch queries.json --api-url http://localhost:9000"
    )
)]
pub struct BatchCommand {
    /// Query list file
    pub file: PathBuf,

    #[command(flatten)]
    pub api: ApiArgs,
}

pub fn run(cmd: BatchCommand, dir: PathBuf, quiet: bool) -> Result<()> {
    let queries = load_queries(&cmd.file)?;
    let total_pages = queries.len() as u64 * u64::from(cmd.api.pages);
    let progress = ProgressBar::new(total_pages, quiet)?;

    let pb = progress.clone();
    let tracker = utils::create_tracker(&dir, &cmd.api)?.with_callback(move |event| match event {
        CycleEvent::PageFetched { page, .. } => {
            pb.set_message(format!("page {}", page));
            pb.inc();
        }
        CycleEvent::PageFailed { page, error } => {
            pb.println(format!("⚠ page {} failed: {}", page, error));
            pb.inc();
        }
        CycleEvent::CycleComplete { report } => pb.set_message(report.name.clone()),
        _ => {}
    });

    let results = tokio::runtime::Runtime::new()?
        .block_on(async { tracker.run_batch(&queries).await });
    progress.finish();

    let mut failed = 0usize;
    for (name, result) in &results {
        match result {
            Ok(report) => {
                if !quiet {
                    println!("{}:", name);
                    for line in cmd_run::summary_lines(report) {
                        println!("  {}", line);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("✗ {}: {:#}", name, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} queries failed", failed, results.len());
    }
    if !quiet {
        println!("✓ {} queries tracked", results.len());
    }
    Ok(())
}
