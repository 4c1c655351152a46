//! YAML configuration for snapshot mode.
//!
//! ```yaml
//! job: kopia-nightly
//! pushgateway: http://pushgateway.local:9091
//! ```
//!
//! Values can also come from the environment (`KOPIA_EXPORTER_JOB`,
//! `KOPIA_EXPORTER_PUSHGATEWAY`). Command-line flags override both.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::ExporterError;

/// Job name used when neither a flag nor the configuration names one.
pub const DEFAULT_JOB: &str = "kopia";

/// Settings loaded from the `--conf` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExporterConfig {
    /// Default job name for pushes.
    #[serde(default)]
    pub job: Option<String>,
    /// Default Pushgateway URL.
    #[serde(default)]
    pub pushgateway: Option<String>,
}

/// Where and under which job a snapshot run's metrics are pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub job: String,
    pub gateway: String,
}

impl ExporterConfig {
    /// Load the configuration file, if any, layered under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ExporterError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        let config = builder
            .add_source(Environment::with_prefix("KOPIA_EXPORTER"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Resolve the push target: flag first, then configuration, then default.
    ///
    /// Empty values count as unset.
    pub fn push_target(
        &self,
        job: Option<&str>,
        pushgateway: Option<&str>,
    ) -> Result<PushTarget, ExporterError> {
        let pick = |flag: Option<&str>, configured: &Option<String>| {
            flag.filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| configured.clone().filter(|v| !v.is_empty()))
        };

        let gateway = pick(pushgateway, &self.pushgateway).ok_or_else(|| {
            ExporterError::Configuration(
                "Pushgateway URL is required. Provide it via --pushgateway or in the config file."
                    .to_string(),
            )
        })?;
        let job = pick(job, &self.job).unwrap_or_else(|| DEFAULT_JOB.to_string());

        Ok(PushTarget { job, gateway })
    }
}
