//! Server mode: keep the shared registry fresh and let Prometheus scrape it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kopia_exporter_metrics::BackupMetrics;
use kopia_exporter_types::{extract, parse_run_list};
use tracing::{error, info, warn};

use crate::tool::{run_command, CommandRunner, Kopia};
use crate::ExporterError;

/// Port the metrics endpoint listens on by default.
pub const DEFAULT_PORT: u16 = 9884;

/// Time between refreshes by default.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

/// Settings for [`Exporter::run`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    pub refresh_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Records whose gauges were updated.
    pub updated: usize,
    /// Malformed records that were skipped.
    pub skipped: usize,
}

/// Polls kopia for the newest run of every source and publishes the results.
#[derive(Debug, Clone)]
pub struct Exporter {
    runner: Arc<dyn CommandRunner>,
    kopia: Kopia,
    metrics: BackupMetrics,
}

impl Exporter {
    pub fn new(runner: Arc<dyn CommandRunner>, kopia: Kopia, metrics: BackupMetrics) -> Self {
        Self {
            runner,
            kopia,
            metrics,
        }
    }

    pub fn metrics(&self) -> &BackupMetrics {
        &self.metrics
    }

    /// Run one refresh cycle.
    ///
    /// A failing kopia invocation or unreadable output fails the whole cycle
    /// and leaves the previous values in place. Malformed records are skipped
    /// one by one.
    pub async fn refresh(&self) -> Result<RefreshSummary, ExporterError> {
        let invocation = self.kopia.list_latest();
        info!("Running command: {}", invocation);

        let started = Instant::now();
        let output = run_command(self.runner.as_ref(), &invocation).await?;
        info!(
            "Finished refreshing data. Duration: {:.2} seconds",
            started.elapsed().as_secs_f64()
        );

        let output = output.check("list snapshots")?;
        let records =
            parse_run_list(&output.stdout).map_err(|source| ExporterError::InvalidOutput {
                source,
                stderr: output.stderr.trim_end().to_string(),
            })?;

        let mut summary = RefreshSummary::default();
        for (index, record) in records.iter().enumerate() {
            match extract(record) {
                Ok(run) => {
                    self.metrics.update(&run);
                    summary.updated += 1;
                }
                Err(e) => {
                    warn!("Skipping run record {}: {}", index, e);
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Serve the metrics endpoint and refresh forever.
    ///
    /// Only returns if the endpoint cannot be bound.
    pub async fn run(&self, options: &ServerOptions) -> Result<(), ExporterError> {
        info!("Listening on port {}", options.port);
        let _server = self
            .metrics
            .serve(options.port)
            .await
            .map_err(|source| ExporterError::Serve {
                port: options.port,
                source,
            })?;

        loop {
            match self.refresh().await {
                Ok(summary) => info!(
                    "Updated metrics for {} sources ({} skipped)",
                    summary.updated, summary.skipped
                ),
                Err(e) => error!("Refresh failed, keeping previous values: {}", e),
            }

            tokio::time::sleep(options.refresh_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::{failed, ok, ScriptedRunner};
    use crate::tool::CommandOutput;
    use kopia_exporter_types::Identity;

    const GOOD: &str = r#"{
        "id": "618f83d08a9938351e8d385a24aca252",
        "source": { "host": "freenas", "userName": "root", "path": "/mnt/media" },
        "startTime": "2023-10-05T09:01:36.265095891Z",
        "endTime": "2023-10-05T09:01:55.028680144Z",
        "stats": { "totalSize": 162291781350, "fileCount": 8054, "dirCount": 221, "errorCount": 0 }
    }"#;

    const NO_SOURCE: &str = r#"{
        "startTime": "2023-10-05T09:01:36.265095891Z",
        "endTime": "2023-10-05T09:01:55.028680144Z",
        "stats": { "totalSize": 1, "fileCount": 1, "dirCount": 1, "errorCount": 0 }
    }"#;

    fn media() -> Identity {
        Identity::new("freenas", "/mnt/media", "root")
    }

    fn exporter(runner: Arc<ScriptedRunner>) -> Exporter {
        Exporter::new(runner, Kopia::default(), BackupMetrics::isolated().unwrap())
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let runner = Arc::new(ScriptedRunner::new([ok(&format!("[{}, {}]", GOOD, NO_SOURCE))]));
        let exporter = exporter(runner);

        let summary = exporter.refresh().await.unwrap();

        assert_eq!(summary, RefreshSummary { updated: 1, skipped: 1 });
        assert_eq!(exporter.metrics().source_count(), 1);
        assert_eq!(
            exporter.metrics().get("total_size", &media()),
            Some(162291781350.0)
        );
        assert_eq!(exporter.metrics().get("backup_duration", &media()), Some(18.0));
    }

    #[tokio::test]
    async fn test_invokes_list_with_config_file() {
        let runner = Arc::new(ScriptedRunner::new([ok("[]")]));
        let exporter = Exporter::new(
            runner.clone(),
            Kopia::default().with_config_file(Some("/etc/kopia.config".into())),
            BackupMetrics::isolated().unwrap(),
        );

        assert_eq!(exporter.refresh().await.unwrap(), RefreshSummary::default());
        assert_eq!(
            runner.calls()[0].to_string(),
            "kopia snapshot list -n 1 --json --config-file /etc/kopia.config"
        );
    }

    #[tokio::test]
    async fn test_invalid_output_keeps_stale_values() {
        let runner = Arc::new(ScriptedRunner::new([
            ok(&format!("[{}]", GOOD)),
            CommandOutput {
                code: Some(0),
                stdout: "ERROR repository not connected".to_string(),
                stderr: "open repository: not found\n".to_string(),
            },
        ]));
        let exporter = exporter(runner);

        exporter.refresh().await.unwrap();
        let err = exporter.refresh().await.unwrap_err();

        assert!(matches!(err, ExporterError::InvalidOutput { .. }));
        assert!(err.to_string().contains("Output was: open repository: not found"));
        assert_eq!(
            exporter.metrics().get("file_count", &media()),
            Some(8054.0)
        );
    }

    #[tokio::test]
    async fn test_failed_command_skips_cycle() {
        let runner = Arc::new(ScriptedRunner::new([
            ok(&format!("[{}]", GOOD)),
            failed(1, "repository is locked"),
        ]));
        let exporter = exporter(runner);

        exporter.refresh().await.unwrap();
        let err = exporter.refresh().await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to list snapshots: repository is locked");
        assert_eq!(exporter.metrics().get("dir_count", &media()), Some(221.0));
    }

    #[tokio::test]
    async fn test_values_are_overwritten_on_next_cycle() {
        let newer = GOOD.replace("8054", "9000");
        let runner = Arc::new(ScriptedRunner::new([
            ok(&format!("[{}]", GOOD)),
            ok(&format!("[{}]", newer)),
        ]));
        let exporter = exporter(runner);

        exporter.refresh().await.unwrap();
        exporter.refresh().await.unwrap();

        assert_eq!(exporter.metrics().source_count(), 1);
        assert_eq!(exporter.metrics().get("file_count", &media()), Some(9000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_interval() {
        let runner = Arc::new(ScriptedRunner::new([ok(&format!("[{}]", GOOD))]));
        let exporter = exporter(runner.clone());
        let options = ServerOptions {
            port: 0,
            refresh_interval: Duration::from_secs(600),
        };

        let task = tokio::spawn(async move { exporter.run(&options).await });

        tokio::time::sleep(Duration::from_secs(1201)).await;
        assert_eq!(runner.calls().len(), 3);

        task.abort();
    }

}
