use super::utils;
use adtrack::{CleanPreview, StoreLayout};
use anyhow::Result;
use clap::Args;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args)]
#[command(
    about = "Remove leftover temporary files from interrupted writes",
    alias = "cleanup",
    long_about = "Every store write goes through <file>.tmp and a rename. A crash between\n\
                  the two leaves the .tmp file behind; the store itself stays intact.\n\
                  This command lists and deletes those leftovers.",
    help_template = crate::clap_help!(
        examples: "  # Clean with confirmation\n  \
                   {bin} clean\n\n  \
                   # Clean without confirmation prompt\n  \
                   {bin} clean --force"
    )
)]
pub struct CleanCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(cmd: CleanCommand, dir: PathBuf, verbose: bool) -> Result<()> {
    let layout = StoreLayout::new(&dir);
    let preview = layout.clean_preview()?;

    if preview.files.is_empty() {
        println!("✓ No temporary files found - store is clean");
        return Ok(());
    }

    display_clean_preview(&dir, &preview);

    if !cmd.force {
        if !confirm_clean()? {
            println!("Cancelled");
            return Ok(());
        }
        println!();
    }

    if verbose {
        println!("Cleaning {}", utils::display_path(&dir).display());
    }

    let result = layout.clean()?;
    println!("✓ Cleaned {} temporary file(s)", result.files_removed);
    if result.bytes_freed > 0 {
        println!("  Freed: {}", utils::format_bytes(result.bytes_freed));
    }

    if !result.errors.is_empty() {
        eprintln!("\n⚠ Warning: Some errors occurred during cleanup:");
        for error in &result.errors {
            eprintln!("  • {}", error);
        }
    }

    Ok(())
}

fn display_clean_preview(dir: &Path, preview: &CleanPreview) {
    println!("Files to be deleted:");
    println!();
    for file in &preview.files {
        let rel_path = file.path.strip_prefix(dir).unwrap_or(&file.path);
        println!("    • {} ({})", rel_path.display(), utils::format_bytes(file.size));
    }
    println!();
    println!(
        "  Total: {} file(s), {}",
        preview.files.len(),
        utils::format_bytes(preview.total_size)
    );
    println!();
}

fn confirm_clean() -> Result<bool> {
    print!("Delete these files? [y/N]: ");
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;

    let response = response.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}
