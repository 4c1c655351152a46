//! Snapshot mode: take one backup, then push its statistics.

use std::sync::Arc;

use kopia_exporter_metrics::{BackupMetrics, Pusher};
use kopia_exporter_types::{extract, ExtractedMetrics, Identity};
use tracing::{info, warn};

use crate::config::{ExporterConfig, PushTarget};
use crate::tool::{run_command, CommandRunner, Kopia, Zfs};
use crate::ExporterError;

/// What to back up and where to report it.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Directory handed to `kopia snapshot create`.
    pub path: String,
    /// ZFS snapshot (`pool/dataset@name`) taken before and destroyed after
    /// the backup.
    pub zfs: Option<String>,
    /// Path to record the snapshot under instead of `path`.
    pub override_source: Option<String>,
    pub job: Option<String>,
    pub pushgateway: Option<String>,
}

/// Result of a successful snapshot run.
#[derive(Debug, Clone)]
pub struct SnapshotReport {
    pub identity: Identity,
    pub target: PushTarget,
    pub metrics: ExtractedMetrics,
}

/// Drives one backup from start to push.
pub struct Snapshotter {
    runner: Arc<dyn CommandRunner>,
    pusher: Arc<dyn Pusher>,
    kopia: Kopia,
    zfs: Zfs,
}

impl Snapshotter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        pusher: Arc<dyn Pusher>,
        kopia: Kopia,
        zfs: Zfs,
    ) -> Self {
        Self {
            runner,
            pusher,
            kopia,
            zfs,
        }
    }

    /// Take the snapshot and push its metrics.
    ///
    /// The push target is resolved before anything is invoked. A ZFS
    /// snapshot, if requested, is destroyed once kopia returns whether or
    /// not the backup succeeded.
    pub async fn run(
        &self,
        config: &ExporterConfig,
        options: &SnapshotOptions,
    ) -> Result<SnapshotReport, ExporterError> {
        let target =
            config.push_target(options.job.as_deref(), options.pushgateway.as_deref())?;

        if let Some(spec) = &options.zfs {
            info!("Creating zfs snapshot {}...", spec);
            run_command(self.runner.as_ref(), &self.zfs.create_snapshot(spec))
                .await?
                .check("create zfs snapshot")?;
        }

        info!("Creating kopia snapshot...");
        let invocation = self
            .kopia
            .create(&options.path, options.override_source.as_deref());
        let backup = run_command(self.runner.as_ref(), &invocation).await;

        if let Some(spec) = &options.zfs {
            self.destroy_zfs_snapshot(spec).await;
        }

        let output = backup?.check("create snapshot")?;
        info!("Finished creating kopia snapshot");

        let record: serde_json::Value =
            serde_json::from_str(&output.stdout).map_err(|source| ExporterError::InvalidOutput {
                source,
                stderr: output.stderr.trim_end().to_string(),
            })?;
        let metrics = extract(&record)?;

        let registry = BackupMetrics::isolated()?;
        let identity = registry
            .update_and_push(self.pusher.as_ref(), &metrics, &target.gateway, &target.job)
            .await?;
        info!("Pushed metrics to pushgateway");

        Ok(SnapshotReport {
            identity,
            target,
            metrics,
        })
    }

    async fn destroy_zfs_snapshot(&self, spec: &str) {
        info!("Destroying zfs snapshot {}...", spec);
        let result = run_command(self.runner.as_ref(), &self.zfs.destroy_snapshot(spec))
            .await
            .and_then(|output| output.check("destroy zfs snapshot"));
        if let Err(e) = result {
            warn!("{}", e);
        }
    }
}
