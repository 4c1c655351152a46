//! # kopia-exporter-metrics
//!
//! The seven backup gauges published by kopia-exporter, and the two ways of
//! getting them to Prometheus: a pull endpoint scraped on demand, or a push to
//! a Pushgateway grouped by the backup source.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kopia_exporter_metrics::BackupMetrics;
//! use kopia_exporter_types::extract;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The shared registry lives for the whole process
//!     let metrics = BackupMetrics::shared()?;
//!     metrics.serve(9884).await?;
//!
//!     let record = serde_json::json!({
//!         "source": { "host": "nas", "userName": "root", "path": "/data" },
//!         "startTime": "2024-09-01T08:55:44.903686123Z",
//!         "endTime": "2024-09-01T08:57:01.000000000Z",
//!         "stats": { "totalSize": 4096, "fileCount": 3, "dirCount": 1, "errorCount": 0 }
//!     });
//!     metrics.update(&extract(&record)?);
//!
//!     // Metrics available at http://localhost:9884/metrics
//!     Ok(())
//! }
//! ```
//!
//! ## Registries
//!
//! - [`BackupMetrics::shared`] binds to the `prometheus` crate's process-wide
//!   default registry. The gauges are registered on first use only, however
//!   many times it is called.
//! - [`BackupMetrics::isolated`] builds a fresh registry holding nothing but
//!   what is written to it, for a single push.

pub mod exposition;
mod metrics;

#[cfg(feature = "push")]
pub mod push;

pub use metrics::{BackupMetrics, GAUGE_NAMES};
pub use prometheus::{Error as RegistryError, Registry};

#[cfg(feature = "push")]
pub use push::{GroupingKey, PushError, PushGateway, Pusher};

// Re-export types for convenience
pub use kopia_exporter_types::{ExtractedMetrics, Identity};
