//! Global constants and helpers for store paths, ingest budgets and marketplace client defaults
use std::path::{Path, PathBuf};

/// Binary name used in user agents
pub const BINARY_NAME: &str = "adtrack";

/// Package version from Cargo.toml (set at compile time)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the user agent string for HTTP requests
pub fn user_agent() -> String {
    format!("{}/{}", BINARY_NAME, VERSION)
}

// ============================================================================
// Store Layout Constants
// ============================================================================

/// Directory (under the store root) holding one shard file per query
pub const ACTIVE_DIR: &str = "active";

/// Directory (under the store root) holding the archive and the retry ledgers
pub const FINAL_DIR: &str = "final";

/// Duplicate ledger file name, kept inside the active directory
pub const LEDGER_FILE: &str = "duplicates.json";

/// Global archive of finalized listings
pub const ARCHIVE_FILE: &str = "archive.json";

/// Expired listings waiting for another fetch attempt
pub const PENDING_FILE: &str = "pending.json";

/// Expired listings given up on after the last fetch attempt
pub const DROPPED_FILE: &str = "dropped.json";

/// Extension of every store file
pub const STORE_EXTENSION: &str = "json";

/// Suffix appended to a store path while it is being rewritten
pub const TEMP_SUFFIX: &str = ".tmp";

/// Returns the shard filename for a logical store name
pub fn shard_filename(name: &str) -> String {
    format!("{}.{}", name, STORE_EXTENSION)
}

/// Resolves a shard path relative to the active directory
pub fn shard_path(active_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    active_dir.as_ref().join(shard_filename(name))
}

/// Returns the temp path used for the atomic rewrite of `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

// ============================================================================
// Ingest Constants
// ============================================================================

/// Number of search pages requested per cycle
pub const DEFAULT_PAGE_BUDGET: u32 = 10;

/// Items requested per search page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Fetch attempts for an expired listing before it is dropped
pub const DEFAULT_MAX_FINALIZE_ATTEMPTS: u32 = 3;

// ============================================================================
// Network Constants
// ============================================================================

/// Default marketplace API base URL
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Environment variable overriding the API base URL for the CLI
pub const API_URL_ENV: &str = "ADTRACK_API_URL";

/// Default HTTP request timeout
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Attempts per marketplace request (first try included)
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Initial backoff between failed marketplace requests, doubled per attempt
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Upper bound for a server-provided Retry-After
pub const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Minimum spacing between two marketplace requests
pub const MIN_REQUEST_INTERVAL_MS: u64 = 200;
