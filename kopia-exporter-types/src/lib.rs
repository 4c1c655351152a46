//! # kopia-exporter-types
//!
//! Schema for the run records kopia prints with `--json`, and the mapping from
//! a record onto the numbers kopia-exporter publishes.
//!
//! Kopia reports a run in one of two shapes. Records from
//! `kopia snapshot list` carry a `stats` object, while some records only carry
//! the directory summary under `rootEntry.summ`. Both are resolved into
//! [`RunStats`] when the record is parsed, so everything downstream of
//! [`RunRecord`] sees a single shape.
//!
//! ## Example
//!
//! ```rust
//! use kopia_exporter_types::extract;
//!
//! let record = serde_json::json!({
//!     "source": { "host": "freenas", "userName": "root", "path": "/x" },
//!     "startTime": "2024-09-01T08:55:44.903686123Z",
//!     "endTime": "2024-09-01T08:55:46.904094456Z",
//!     "rootEntry": { "summ": { "size": 277, "files": 1, "dirs": 1, "numFailed": 0 } }
//! });
//!
//! let metrics = extract(&record).unwrap();
//! assert_eq!(metrics.identity.host, "freenas");
//! assert_eq!(metrics.total_size, 277);
//! assert_eq!(metrics.duration_seconds, 2);
//! ```

mod error;
mod extract;
mod record;
mod timestamp;

pub use error::MalformedRecord;
pub use extract::{extract, ExtractedMetrics, Identity};
pub use record::{parse_run_list, RunRecord, RunStats, Source};
pub use timestamp::parse_timestamp;
