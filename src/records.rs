// src/records.rs
use serde_json::Value;

/// A listing being tracked until its end time passes
///
/// Stored in a shard as `"itemId": endTime`. The end time is kept exactly as
/// the marketplace sent it; an unknown end time is `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRecord {
    pub item_id: String,
    pub expiry: Value,
}

impl ActiveRecord {
    pub fn new(item_id: impl Into<String>, expiry: impl Into<Value>) -> Self {
        Self {
            item_id: item_id.into(),
            expiry: expiry.into(),
        }
    }

    pub fn into_entry(self) -> (String, Value) {
        (self.item_id, self.expiry)
    }
}

/// The archived snapshot of a listing after it ended
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRecord {
    pub item_id: String,
    pub payload: Value,
}

impl FinalRecord {
    pub fn new(item_id: impl Into<String>, payload: Value) -> Self {
        Self {
            item_id: item_id.into(),
            payload,
        }
    }

    pub fn into_entry(self) -> (String, Value) {
        (self.item_id, self.payload)
    }
}
