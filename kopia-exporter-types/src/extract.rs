//! Mapping a run record onto the published numbers.

use serde_json::Value;

use crate::record::{DirSummary, RunRecord, RunStats, SnapshotStats};
use crate::timestamp::unix_seconds;
use crate::MalformedRecord;

/// The `(host, path, user)` triple that labels every series of a backup source.
///
/// Also used as the Pushgateway grouping key in snapshot mode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    pub host: String,
    pub path: String,
    pub user: String,
}

impl Identity {
    /// Label names, in exposition order.
    pub const LABEL_NAMES: [&'static str; 3] = ["host", "path", "user"];

    pub fn new(host: impl Into<String>, path: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            user: user.into(),
        }
    }

    /// `(name, value)` label pairs, in the order of [`Self::LABEL_NAMES`].
    pub fn labels(&self) -> [(&'static str, &str); 3] {
        [
            ("host", self.host.as_str()),
            ("path", self.path.as_str()),
            ("user", self.user.as_str()),
        ]
    }

    /// Label values alone, in the order of [`Self::LABEL_NAMES`].
    pub fn label_values(&self) -> [&str; 3] {
        [self.host.as_str(), self.path.as_str(), self.user.as_str()]
    }
}

/// Everything published about one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMetrics {
    pub identity: Identity,
    /// Bytes.
    pub total_size: u64,
    pub file_count: u64,
    pub dir_count: u64,
    pub error_count: u64,
    /// Whole seconds between start and end, truncated toward zero. Negative if
    /// kopia reported the end before the start.
    pub duration_seconds: i64,
    pub start_time_unix: f64,
    pub end_time_unix: f64,
}

struct Counts {
    total_size: u64,
    file_count: u64,
    dir_count: u64,
    error_count: u64,
}

impl From<&SnapshotStats> for Counts {
    fn from(stats: &SnapshotStats) -> Self {
        Counts {
            total_size: stats.total_size,
            file_count: stats.file_count,
            dir_count: stats.dir_count,
            error_count: stats.error_count,
        }
    }
}

impl From<&DirSummary> for Counts {
    fn from(summ: &DirSummary) -> Self {
        Counts {
            total_size: summ.size,
            file_count: summ.files,
            dir_count: summ.dirs,
            error_count: summ.num_failed,
        }
    }
}

impl RunRecord {
    /// Identity of the source this run belongs to.
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.source.host.clone(),
            self.source.path.clone(),
            self.source.user_name.clone(),
        )
    }

    /// Compute the published numbers for this run.
    pub fn extract(&self) -> ExtractedMetrics {
        let counts = match &self.stats {
            RunStats::Stats(stats) => Counts::from(stats),
            RunStats::Summary(summ) => Counts::from(summ),
        };

        ExtractedMetrics {
            identity: self.identity(),
            total_size: counts.total_size,
            file_count: counts.file_count,
            dir_count: counts.dir_count,
            error_count: counts.error_count,
            duration_seconds: (self.end_time - self.start_time).num_seconds(),
            start_time_unix: unix_seconds(&self.start_time),
            end_time_unix: unix_seconds(&self.end_time),
        }
    }
}

/// Extract the published numbers from one JSON run record.
pub fn extract(record: &Value) -> Result<ExtractedMetrics, MalformedRecord> {
    Ok(RunRecord::from_value(record)?.extract())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats_record() -> Value {
        json!({
            "source": { "host": "freenas", "userName": "root", "path": "/mnt/media" },
            "startTime": "2023-10-05T09:01:36.265095891Z",
            "endTime": "2023-10-05T09:01:55.028680144Z",
            "stats": { "totalSize": 162291781350u64, "fileCount": 8054, "dirCount": 221, "errorCount": 2 }
        })
    }

    fn summary_record() -> Value {
        json!({
            "source": { "host": "freenas", "userName": "root", "path": "/mnt/media" },
            "startTime": "2023-10-05T09:01:36.265095891Z",
            "endTime": "2023-10-05T09:01:55.028680144Z",
            "rootEntry": {
                "name": "media",
                "summ": { "size": 162291781350u64, "files": 8054, "symlinks": 0, "dirs": 221, "numFailed": 2 }
            }
        })
    }

    #[test]
    fn test_both_shapes_extract_identically() {
        let from_stats = extract(&stats_record()).unwrap();
        let from_summary = extract(&summary_record()).unwrap();

        assert_eq!(from_stats, from_summary);
        assert_eq!(from_stats.total_size, 162_291_781_350);
        assert_eq!(from_stats.file_count, 8054);
        assert_eq!(from_stats.dir_count, 221);
        assert_eq!(from_stats.error_count, 2);
        assert_eq!(from_stats.duration_seconds, 18);
    }

    #[test]
    fn test_identity_uses_user_name() {
        let metrics = extract(&stats_record()).unwrap();
        assert_eq!(metrics.identity, Identity::new("freenas", "/mnt/media", "root"));
    }

    #[test]
    fn test_sub_second_run_has_zero_duration() {
        let mut record = summary_record();
        record["startTime"] = json!("2024-09-01T08:55:44.903686123Z");
        record["endTime"] = json!("2024-09-01T08:55:44.904094456Z");

        let metrics = extract(&record).unwrap();
        assert_eq!(metrics.duration_seconds, 0);
        assert_eq!(metrics.start_time_unix, 1_725_180_944.903686);
        assert_eq!(metrics.end_time_unix, 1_725_180_944.904094);
    }

    #[test]
    fn test_duration_truncates() {
        let mut record = stats_record();
        record["startTime"] = json!("2024-09-01T08:55:44.900000000Z");
        record["endTime"] = json!("2024-09-01T08:55:46.800000000Z");

        assert_eq!(extract(&record).unwrap().duration_seconds, 1);
    }

    #[test]
    fn test_negative_duration_is_not_clamped() {
        let mut record = stats_record();
        record["startTime"] = json!("2024-09-01T09:00:00.000000000Z");
        record["endTime"] = json!("2024-09-01T08:59:55.000000000Z");

        let metrics = extract(&record).unwrap();
        assert_eq!(metrics.duration_seconds, -5);
        assert!(metrics.end_time_unix < metrics.start_time_unix);
    }

    #[test]
    fn test_runs_longer_than_a_day() {
        let mut record = stats_record();
        record["startTime"] = json!("2024-09-01T00:00:00.000000000Z");
        record["endTime"] = json!("2024-09-02T00:00:01.000000000Z");

        assert_eq!(extract(&record).unwrap().duration_seconds, 86_401);
    }

    #[test]
    fn test_missing_host_is_malformed() {
        let mut record = stats_record();
        record["source"].as_object_mut().unwrap().remove("host");

        let err = extract(&record).unwrap_err();
        assert!(matches!(err, MalformedRecord::Schema(_)));
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_missing_source_is_malformed() {
        let mut record = stats_record();
        record.as_object_mut().unwrap().remove("source");

        assert!(matches!(extract(&record), Err(MalformedRecord::Schema(_))));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let mut record = stats_record();
        record["endTime"] = json!("2023-10-05 09:01:55");

        assert!(matches!(
            extract(&record),
            Err(MalformedRecord::Timestamp { .. })
        ));
    }

    #[test]
    fn test_non_object_is_malformed() {
        assert!(extract(&json!([1, 2, 3])).is_err());
        assert!(extract(&json!(null)).is_err());
    }

    #[test]
    fn test_identity_labels_order() {
        let identity = Identity::new("h", "/p", "u");
        let names: Vec<_> = identity.labels().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, Identity::LABEL_NAMES);
        assert_eq!(identity.label_values(), ["h", "/p", "u"]);
    }
}
