//! Pushgateway client.
//!
//! Pushes use `PUT`, so each push replaces every metric previously pushed
//! under the same grouping key. The grouping key is the job name plus the
//! `{host, path, user}` identity of the backup source.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kopia_exporter_metrics::{BackupMetrics, PushGateway};
//! use kopia_exporter_types::extract;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let record = serde_json::json!({
//!         "source": { "host": "nas", "userName": "root", "path": "/data" },
//!         "startTime": "2024-09-01T08:55:44.903686123Z",
//!         "endTime": "2024-09-01T08:57:01.000000000Z",
//!         "stats": { "totalSize": 4096, "fileCount": 3, "dirCount": 1, "errorCount": 0 }
//!     });
//!
//!     let metrics = BackupMetrics::isolated()?;
//!     let gateway = PushGateway::new()?;
//!     metrics
//!         .update_and_push(&gateway, &extract(&record)?, "http://localhost:9091", "kopia")
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use kopia_exporter_types::Identity;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::{PathSegmentsMut, Url};

use crate::exposition::TEXT_CONTENT_TYPE;

/// Errors that can occur when pushing to a Pushgateway.
#[derive(Debug, Error)]
pub enum PushError {
    /// The registry could not be rendered.
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    /// The gateway URL cannot be used as a base for the push path.
    #[error("Invalid pushgateway URL: {0}")]
    InvalidUrl(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The gateway answered with a non-success status.
    #[error("Pushgateway returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PushError::Timeout
        } else if err.is_connect() {
            PushError::Connection(err.to_string())
        } else {
            PushError::Http(err.to_string())
        }
    }
}

/// Labels identifying one group of pushed metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingKey {
    pub job: String,
    pub identity: Identity,
}

impl GroupingKey {
    pub fn new(job: impl Into<String>, identity: Identity) -> Self {
        Self {
            job: job.into(),
            identity,
        }
    }
}

/// Something that delivers rendered metrics to a gateway.
#[async_trait]
pub trait Pusher: Send + Sync {
    /// Replace the metrics stored under `key` on `gateway` with `body`, a
    /// text exposition.
    async fn push(&self, gateway: &str, key: &GroupingKey, body: String) -> Result<(), PushError>;
}

/// HTTP client for the Prometheus Pushgateway.
#[derive(Debug, Clone)]
pub struct PushGateway {
    client: Client,
}

impl PushGateway {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self, PushError> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, PushError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Pusher for PushGateway {
    async fn push(&self, gateway: &str, key: &GroupingKey, body: String) -> Result<(), PushError> {
        let url = grouping_url(gateway, key)?;
        debug!("Pushing {} bytes to {}", body.len(), url);

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Build `<gateway>/metrics/job/<job>/host/<host>/path/<path>/user/<user>`.
///
/// A gateway without a scheme is taken to be plain `http`. Values containing
/// `/` (backup paths, usually) and the dot segments `.` and `..` are sent in
/// the `<label>@base64/<value>` form.
pub fn grouping_url(gateway: &str, key: &GroupingKey) -> Result<Url, PushError> {
    let base = if gateway.contains("://") {
        gateway.to_string()
    } else {
        format!("http://{}", gateway)
    };

    let mut url = Url::parse(&base).map_err(|e| PushError::InvalidUrl(format!("{}: {}", gateway, e)))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| PushError::InvalidUrl(format!("{}: cannot be a base", gateway)))?;
        segments.pop_if_empty().push("metrics");
        push_label(&mut segments, "job", &key.job);
        for (name, value) in key.identity.labels() {
            push_label(&mut segments, name, value);
        }
    }

    Ok(url)
}

fn push_label(segments: &mut PathSegmentsMut<'_>, name: &str, value: &str) {
    if value.contains('/') || value == "." || value == ".." {
        segments
            .push(&format!("{}@base64", name))
            .push(&URL_SAFE.encode(value));
    } else if value.is_empty() {
        segments.push(&format!("{}@base64", name)).push("=");
    } else {
        segments.push(name).push(value);
    }
}
