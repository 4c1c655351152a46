//! The seven backup gauges and the shared/isolated registry lifecycles.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use kopia_exporter_types::{ExtractedMetrics, Identity};
use parking_lot::{const_mutex, Mutex, RwLock};
use prometheus::{GaugeVec, Opts, Registry};

use crate::exposition;

/// Names of the published gauges.
pub const GAUGE_NAMES: [&str; 7] = [
    "total_size",
    "file_count",
    "dir_count",
    "error_count",
    "backup_duration",
    "backup_start_time",
    "backup_end_time",
];

struct BackupGauges {
    total_size: GaugeVec,
    file_count: GaugeVec,
    dir_count: GaugeVec,
    error_count: GaugeVec,
    backup_duration: GaugeVec,
    backup_start_time: GaugeVec,
    backup_end_time: GaugeVec,
}

impl BackupGauges {
    fn register(registry: &Registry) -> prometheus::Result<Self> {
        let gauge = |name: &str, help: &str| -> prometheus::Result<GaugeVec> {
            let gauge = GaugeVec::new(Opts::new(name, help), &Identity::LABEL_NAMES)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        Ok(Self {
            total_size: gauge("total_size", "Total size of the backup")?,
            file_count: gauge("file_count", "Number of files in the backup")?,
            dir_count: gauge("dir_count", "Number of directories in the backup")?,
            error_count: gauge("error_count", "Number of errors in the backup")?,
            backup_duration: gauge("backup_duration", "Duration of the backup")?,
            backup_start_time: gauge("backup_start_time", "Start time of the backup")?,
            backup_end_time: gauge("backup_end_time", "End time of the backup")?,
        })
    }

    fn by_name(&self, name: &str) -> Option<&GaugeVec> {
        match name {
            "total_size" => Some(&self.total_size),
            "file_count" => Some(&self.file_count),
            "dir_count" => Some(&self.dir_count),
            "error_count" => Some(&self.error_count),
            "backup_duration" => Some(&self.backup_duration),
            "backup_start_time" => Some(&self.backup_start_time),
            "backup_end_time" => Some(&self.backup_end_time),
            _ => None,
        }
    }
}

/// Backup gauges bound to a registry.
///
/// Cloning is cheap and clones share the same gauges.
#[derive(Clone)]
pub struct BackupMetrics {
    registry: Registry,
    gauges: Arc<BackupGauges>,
    sources: Arc<RwLock<BTreeSet<Identity>>>,
}

impl fmt::Debug for BackupMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupMetrics")
            .field("sources", &self.source_count())
            .finish_non_exhaustive()
    }
}

static SHARED: Mutex<Option<BackupMetrics>> = const_mutex(None);

impl BackupMetrics {
    /// Gauges in the process-wide [`prometheus::default_registry`].
    ///
    /// The first call registers the seven families; later calls return the
    /// same gauges.
    pub fn shared() -> prometheus::Result<Self> {
        let mut shared = SHARED.lock();
        if let Some(metrics) = shared.as_ref() {
            return Ok(metrics.clone());
        }

        let metrics = Self::register_in(prometheus::default_registry().clone())?;
        *shared = Some(metrics.clone());
        Ok(metrics)
    }

    /// Gauges in a fresh registry, used for a single push and then dropped.
    pub fn isolated() -> prometheus::Result<Self> {
        Self::register_in(Registry::new())
    }

    /// [`Self::isolated`] when `isolated` is true, [`Self::shared`] otherwise.
    pub fn new(isolated: bool) -> prometheus::Result<Self> {
        if isolated {
            Self::isolated()
        } else {
            Self::shared()
        }
    }

    /// Register the seven families in `registry`.
    ///
    /// Fails with [`prometheus::Error::AlreadyReg`] if the registry already
    /// holds them.
    pub fn register_in(registry: Registry) -> prometheus::Result<Self> {
        let gauges = BackupGauges::register(&registry)?;
        Ok(Self {
            registry,
            gauges: Arc::new(gauges),
            sources: Arc::default(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Set all seven gauges for the run's source, creating the series on
    /// first sight. Returns the source identity for use as a grouping key.
    pub fn update(&self, metrics: &ExtractedMetrics) -> Identity {
        let identity = &metrics.identity;
        let labels = identity.label_values();
        let g = &self.gauges;

        g.total_size.with_label_values(&labels).set(metrics.total_size as f64);
        g.file_count.with_label_values(&labels).set(metrics.file_count as f64);
        g.dir_count.with_label_values(&labels).set(metrics.dir_count as f64);
        g.error_count.with_label_values(&labels).set(metrics.error_count as f64);
        g.backup_duration
            .with_label_values(&labels)
            .set(metrics.duration_seconds as f64);
        g.backup_start_time
            .with_label_values(&labels)
            .set(metrics.start_time_unix);
        g.backup_end_time
            .with_label_values(&labels)
            .set(metrics.end_time_unix);

        self.sources.write().insert(identity.clone());
        identity.clone()
    }

    /// Current value of one gauge for one source, if the source was updated.
    pub fn get(&self, gauge: &str, identity: &Identity) -> Option<f64> {
        if !self.sources.read().contains(identity) {
            return None;
        }
        self.gauges
            .by_name(gauge)?
            .get_metric_with_label_values(&identity.label_values())
            .ok()
            .map(|series| series.get())
    }

    /// Number of sources with series in this registry.
    pub fn source_count(&self) -> usize {
        self.sources.read().len()
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        exposition::encode(&self.registry)
    }

    /// Serve this registry on `0.0.0.0:<port>` from a background task.
    #[cfg(feature = "server")]
    pub async fn serve(&self, port: u16) -> std::io::Result<exposition::RunningServer> {
        let config = exposition::EndpointConfig::builder().port(port).build();
        exposition::start_server(self.registry.clone(), &config).await
    }

    /// Push the registry's current contents to a Pushgateway, grouped by
    /// `job` and the source identity.
    #[cfg(feature = "push")]
    pub async fn push<P>(
        &self,
        pusher: &P,
        gateway: &str,
        job: &str,
        identity: &Identity,
    ) -> Result<(), crate::push::PushError>
    where
        P: crate::push::Pusher + ?Sized,
    {
        let key = crate::push::GroupingKey::new(job, identity.clone());
        pusher.push(gateway, &key, self.render()?).await
    }

    /// [`Self::update`] followed by [`Self::push`] for the same source.
    #[cfg(feature = "push")]
    pub async fn update_and_push<P>(
        &self,
        pusher: &P,
        metrics: &ExtractedMetrics,
        gateway: &str,
        job: &str,
    ) -> Result<Identity, crate::push::PushError>
    where
        P: crate::push::Pusher + ?Sized,
    {
        let identity = self.update(metrics);
        self.push(pusher, gateway, job, &identity).await?;
        Ok(identity)
    }
}
