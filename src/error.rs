//! Error types for the exporter drivers.

use std::io;

use kopia_exporter_metrics::{PushError, RegistryError};
use kopia_exporter_types::MalformedRecord;
use thiserror::Error;

/// Errors that can stop a refresh cycle or a snapshot run.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// A run record is missing fields or has an unparseable timestamp.
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),

    /// An external command ran but exited unsuccessfully.
    #[error("Failed to {action}: {stderr}")]
    ToolInvocation { action: &'static str, stderr: String },

    /// An external command could not be started at all.
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A command's output was not the JSON it should have been.
    #[error("Failed to decode JSON: {source}\nOutput was: {stderr}")]
    InvalidOutput {
        #[source]
        source: serde_json::Error,
        stderr: String,
    },

    /// No Pushgateway URL was given by flag, configuration or environment.
    #[error("{0}")]
    Configuration(String),

    /// The configuration file could not be loaded.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// The backup gauges could not be registered.
    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] RegistryError),

    /// The metrics endpoint could not be bound.
    #[error("Failed to listen on port {port}: {source}")]
    Serve {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The Pushgateway could not be reached or rejected the push.
    #[error("Failed to push metrics: {0}")]
    Push(#[from] PushError),
}
