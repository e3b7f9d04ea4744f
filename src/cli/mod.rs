use anyhow::Result;
use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

// CLI Commands (cmd_ prefix)
mod cmd_batch;
mod cmd_clean;
mod cmd_dedup;
mod cmd_run;
mod cmd_status;

// Helper modules (no cmd_ prefix)
mod logger;
mod progress;
mod utils;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format custom help template with grouped commands
fn format_help_template() -> &'static str {
    concat!(
        "{about-with-newline}\n\n",
        "{usage-heading}\n  {usage}\n\n",
        "Options:\n{options}\n\n",
        "Tracking:\n",
        "  run       Run one tracking cycle for a search query\n",
        "  batch     Run a tracking cycle for every query in a list\n",
        "\n",
        "Maintenance:\n",
        "  dedup     Remove listings that appear in more than one shard\n",
        "  status    Show shard, archive and ledger sizes\n",
        "  clean     Remove leftover temporary files from interrupted writes\n",
        "\n",
        "See 'adtrack <COMMAND> --help' for more information on a specific command.\n"
    )
}

#[derive(Parser)]
#[command(bin_name = "adtrack")]
#[command(version = VERSION)]
#[command(about = concat!("adtrack v", env!("CARGO_PKG_VERSION"), " - marketplace listing tracker"))]
#[command(long_about = concat!(
    "adtrack v", env!("CARGO_PKG_VERSION"), " - marketplace listing tracker\n\n",
    "Records active listings per search query with their end time, and\n",
    "archives the full listing once that end time has passed."
))]
#[command(propagate_version = true)]
#[command(help_template = format_help_template())]
pub struct Cli {
    /// Store root directory
    #[arg(short = 'C', long = "dir", global = true, default_value = ".", value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    /// Suppress progress output
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(cmd_run::RunCommand),
    Batch(cmd_batch::BatchCommand),
    Dedup(cmd_dedup::DedupCommand),
    Status(cmd_status::StatusCommand),
    Clean(cmd_clean::CleanCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init_logger(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(cmd) => cmd_run::run(cmd, cli.dir, cli.quiet)?,
        Commands::Batch(cmd) => cmd_batch::run(cmd, cli.dir, cli.quiet)?,
        Commands::Dedup(cmd) => cmd_dedup::run(cmd, cli.dir, cli.quiet)?,
        Commands::Status(cmd) => cmd_status::run(cmd, cli.dir)?,
        Commands::Clean(cmd) => cmd_clean::run(cmd, cli.dir, cli.verbose)?,
    }

    Ok(())
}

/// Macro to create clap help templates with examples
/// This works around the limitation that {bin} doesn't work in after_help
#[macro_export]
macro_rules! clap_help {
    (examples: $examples:literal) => {{
        const BIN: &str = env!("CARGO_PKG_NAME");
        concat!(
            "{about-with-newline}\n",
            "{usage-heading} {usage}\n\n",
            "{all-args}\n\n",
            "Examples:\n",
            $examples
        ).replace("{bin}", BIN)
    }};
}
