//! Run records as printed by `kopia snapshot list --json` and
//! `kopia snapshot create --json`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::timestamp::parse_timestamp;
use crate::MalformedRecord;

/// The backup source a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub host: String,
    pub user_name: String,
    pub path: String,
}

/// Size and count statistics of a run, in whichever shape kopia reported them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStats {
    /// The `stats` object of a snapshot manifest.
    Stats(SnapshotStats),
    /// The `rootEntry.summ` directory summary, used when `stats` is absent.
    Summary(DirSummary),
}

/// `stats` object of a snapshot manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub total_size: u64,
    pub file_count: u64,
    pub dir_count: u64,
    pub error_count: u64,
}

/// `rootEntry.summ` object of a snapshot manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirSummary {
    pub size: u64,
    pub files: u64,
    pub dirs: u64,
    pub num_failed: u64,
}

/// One backup run, with its statistics shape resolved and timestamps parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub source: Source,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stats: RunStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRunRecord {
    source: Source,
    start_time: String,
    end_time: String,
    #[serde(default)]
    stats: Option<SnapshotStats>,
    #[serde(default)]
    root_entry: Option<RawRootEntry>,
}

#[derive(Debug, Deserialize)]
struct RawRootEntry {
    #[serde(default)]
    summ: Option<DirSummary>,
}

impl TryFrom<RawRunRecord> for RunRecord {
    type Error = MalformedRecord;

    fn try_from(raw: RawRunRecord) -> Result<Self, Self::Error> {
        let stats = match (raw.stats, raw.root_entry.and_then(|e| e.summ)) {
            (Some(stats), _) => RunStats::Stats(stats),
            (None, Some(summ)) => RunStats::Summary(summ),
            (None, None) => return Err(MalformedRecord::MissingStats),
        };

        Ok(RunRecord {
            source: raw.source,
            start_time: parse_timestamp(&raw.start_time)?,
            end_time: parse_timestamp(&raw.end_time)?,
            stats,
        })
    }
}

impl RunRecord {
    /// Read a record from an already parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, MalformedRecord> {
        RawRunRecord::deserialize(value)?.try_into()
    }
}

/// Split the output of `kopia snapshot list --json` into its elements.
///
/// Elements are left as raw JSON so a single malformed record can be skipped
/// without rejecting the rest of the list.
pub fn parse_run_list(json: &str) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::from_str(json)
}
