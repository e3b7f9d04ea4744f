// Shared helpers for CLI commands

use adtrack::constants;
use adtrack::{HttpMarketplace, StoreLayout, Tracker, TrackerConfigBuilder};
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Marketplace connection and per-cycle settings shared by `run` and `batch`
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Marketplace API base URL
    #[arg(long, env = constants::API_URL_ENV, default_value = constants::DEFAULT_API_URL)]
    pub api_url: String,

    /// Search pages fetched per query
    #[arg(long, default_value_t = constants::DEFAULT_PAGE_BUDGET)]
    pub pages: u32,

    /// Items requested per page
    #[arg(long, default_value_t = constants::DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Restrict searches to a category id
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict searches to a location (e.g. US)
    #[arg(long)]
    pub located_in: Option<String>,

    /// Fetch attempts before an expired listing is dropped
    #[arg(long, default_value_t = constants::DEFAULT_MAX_FINALIZE_ATTEMPTS)]
    pub max_attempts: u32,
}

/// Build a tracker over the HTTP marketplace from the command line settings
pub fn create_tracker(dir: &Path, api: &ApiArgs) -> Result<Tracker<HttpMarketplace>> {
    let marketplace = HttpMarketplace::new(&api.api_url)
        .with_context(|| format!("Failed to create client for {}", api.api_url))?;

    let mut builder = TrackerConfigBuilder::new()
        .page_budget(api.pages)
        .page_size(api.page_size)
        .max_finalize_attempts(api.max_attempts);
    if let Some(category) = &api.category {
        builder = builder.category_id(category);
    }
    if let Some(location) = &api.located_in {
        builder = builder.located_in(location);
    }

    Ok(Tracker::new(StoreLayout::new(dir), marketplace, builder.build()))
}

/// Canonical path for display, falling back to the path as given
pub fn display_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// "ad" or "ads"
pub fn plural_ads(n: usize) -> &'static str {
    if n == 1 { "ad" } else { "ads" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
