use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kopia_exporter::config::ExporterConfig;
use kopia_exporter::server::{Exporter, ServerOptions, DEFAULT_PORT};
use kopia_exporter::snapshot::{SnapshotOptions, Snapshotter};
use kopia_exporter::tool::{Kopia, SystemRunner, Zfs};
use kopia_exporter_metrics::{BackupMetrics, PushGateway};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kopia-exporter")]
#[command(about = "Export kopia backup statistics as Prometheus metrics")]
struct Args {
    /// YAML configuration file with `job` and `pushgateway` defaults
    #[arg(long, global = true, value_parser = existing_file)]
    conf: Option<PathBuf>,

    /// kopia executable to invoke
    #[arg(long, global = true, default_value = "kopia")]
    kopia_bin: String,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the newest run of every source on a pull endpoint
    Server {
        /// Port for the metrics endpoint
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// kopia repository config file
        #[arg(long)]
        config_file: Option<PathBuf>,

        /// Seconds between refreshes
        #[arg(long, default_value = "600")]
        refresh_interval: u64,
    },

    /// Take one snapshot and push its statistics to a Pushgateway
    Snapshot {
        /// Directory to back up
        path: String,

        /// ZFS snapshot (pool/dataset@name) to take first and destroy afterwards
        #[arg(short, long)]
        zfs: Option<String>,

        /// Record the snapshot under this source path
        #[arg(short, long)]
        override_source: Option<String>,

        /// Pushgateway job name
        #[arg(long)]
        job: Option<String>,

        /// Pushgateway URL
        #[arg(long)]
        pushgateway: Option<String>,
    },
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{} does not exist", value))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    kopia_exporter::logging::init(&args.log_level);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let config = ExporterConfig::load(args.conf.as_deref())?;
    let runner = Arc::new(SystemRunner);

    match args.command {
        Command::Server {
            port,
            config_file,
            refresh_interval,
        } => {
            let kopia = Kopia::new(args.kopia_bin).with_config_file(config_file);
            let exporter = Exporter::new(runner, kopia, BackupMetrics::shared()?);
            let options = ServerOptions {
                port,
                refresh_interval: Duration::from_secs(refresh_interval),
            };
            exporter.run(&options).await?;
        }
        Command::Snapshot {
            path,
            zfs,
            override_source,
            job,
            pushgateway,
        } => {
            let snapshotter = Snapshotter::new(
                runner,
                Arc::new(PushGateway::new()?),
                Kopia::new(args.kopia_bin),
                Zfs::default(),
            );
            let options = SnapshotOptions {
                path,
                zfs,
                override_source,
                job,
                pushgateway,
            };
            let report = snapshotter.run(&config, &options).await?;
            info!(
                "Snapshot of {} on {} reported to {} as job {}",
                report.identity.path, report.identity.host, report.target.gateway, report.target.job
            );
        }
    }

    Ok(())
}
