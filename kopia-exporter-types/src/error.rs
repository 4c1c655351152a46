//! Errors raised while reading a run record.

use thiserror::Error;

/// A run record that cannot be turned into metrics.
#[derive(Debug, Error)]
pub enum MalformedRecord {
    /// The JSON does not match the record schema (missing `source`, missing
    /// fields, wrong types).
    #[error("malformed run record: {0}")]
    Schema(#[from] serde_json::Error),

    /// Neither `stats` nor `rootEntry.summ` is present.
    #[error("malformed run record: no `stats` or `rootEntry.summ` object")]
    MissingStats,

    /// A timestamp could not be parsed.
    #[error("malformed run record: invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },
}
