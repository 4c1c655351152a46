//! # kopia-exporter
//!
//! Exports statistics about kopia backup runs as Prometheus gauges.
//!
//! Two modes share one extraction and registry pipeline:
//!
//! - **[`server`]**: poll `kopia snapshot list` on an interval and serve the
//!   newest run of every source on a pull endpoint.
//! - **[`snapshot`]**: run `kopia snapshot create` once, optionally inside a
//!   ZFS snapshot, and push the result to a Prometheus Pushgateway.
//!
//! ```text
//!  kopia JSON ──▶ extract ──▶ BackupMetrics ──▶ /metrics   (server)
//!                                          └──▶ PUT gateway (snapshot)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kopia_exporter::config::ExporterConfig;
//! use kopia_exporter::snapshot::{SnapshotOptions, Snapshotter};
//! use kopia_exporter::tool::{Kopia, SystemRunner, Zfs};
//! use kopia_exporter_metrics::PushGateway;
//!
//! # tokio_test::block_on(async {
//! let snapshotter = Snapshotter::new(
//!     Arc::new(SystemRunner),
//!     Arc::new(PushGateway::new()?),
//!     Kopia::default(),
//!     Zfs::default(),
//! );
//! let options = SnapshotOptions {
//!     path: "/mnt/media".to_string(),
//!     pushgateway: Some("http://localhost:9091".to_string()),
//!     ..SnapshotOptions::default()
//! };
//! let report = snapshotter.run(&ExporterConfig::default(), &options).await?;
//! println!("pushed {} under job {}", report.identity.path, report.target.job);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod snapshot;
pub mod tool;

pub use config::{ExporterConfig, PushTarget};
pub use error::ExporterError;
pub use server::{Exporter, RefreshSummary, ServerOptions};
pub use snapshot::{SnapshotOptions, SnapshotReport, Snapshotter};
