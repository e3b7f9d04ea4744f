//! Wall-clock expiry checks for listing end times
use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde_json::Value;

/// Naive formats accepted in addition to RFC 3339 (interpreted as UTC)
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryError {
    #[error("expiry is missing")]
    Missing,
    #[error("expiry is not a string: {0}")]
    NotAString(String),
    #[error("unparseable expiry {0:?}")]
    Unparseable(String),
}

/// Outcome of checking one stored expiry value against a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryStatus {
    Expired,
    Active,
    Unknown(ExpiryError),
}

impl ExpiryStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self, ExpiryStatus::Expired)
    }
}

/// Parse an end time as sent by the marketplace.
///
/// RFC 3339 strings keep their offset; timestamps without one are read as UTC.
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, ExpiryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExpiryError::Missing);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ExpiryError::Unparseable(trimmed.to_string()))
}

/// Parse the value stored in a shard (a string, or null when unknown)
pub fn parse_expiry_value(value: &Value) -> Result<DateTime<Utc>, ExpiryError> {
    match value {
        Value::Null => Err(ExpiryError::Missing),
        Value::String(s) => parse_expiry(s),
        other => Err(ExpiryError::NotAString(other.to_string())),
    }
}

/// True iff `expiry` is at or before `now`
pub fn is_expired_at(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiry <= now
}

/// Classify a stored expiry value relative to `now`
pub fn evaluate(value: &Value, now: DateTime<Utc>) -> ExpiryStatus {
    match parse_expiry_value(value) {
        Ok(expiry) if is_expired_at(expiry, now) => ExpiryStatus::Expired,
        Ok(_) => ExpiryStatus::Active,
        Err(e) => ExpiryStatus::Unknown(e),
    }
}

/// Check a stored expiry against the current wall clock.
///
/// Values that cannot be parsed are reported and treated as not expired.
pub fn is_expired(value: &Value) -> bool {
    match evaluate(value, Utc::now()) {
        ExpiryStatus::Expired => true,
        ExpiryStatus::Active => false,
        ExpiryStatus::Unknown(e) => {
            warn!("expiry check skipped: {}", e);
            false
        }
    }
}
