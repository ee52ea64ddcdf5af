use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use prload_core::{Profile, RunConfig};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "prload=info";

/// Drive a team / pull-request / review service with a mixed workload.
#[derive(Parser, Debug)]
#[command(name = "prload", version)]
struct Cli {
    /// Preset workload: mixed, mixed-activity or reassign-batch.
    #[arg(short, long, default_value_t = Profile::Mixed)]
    profile: Profile,

    /// Full run configuration as JSON. Replaces the profile.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Invocations per second for every scenario.
    #[arg(short, long)]
    rate: Option<NonZeroU32>,

    /// Scenario duration, e.g. `2m` or `30s`.
    #[arg(short, long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Pre-allocated workers per scenario.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Pull requests per batch reassignment.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    prometheus: Option<SocketAddr>,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Unable to read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid run configuration in {}", path.display()))?
            }
            None => RunConfig::from_profile(self.profile),
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        for scenario in config.scenarios.iter_mut() {
            if let Some(rate) = self.rate {
                scenario.rate = rate;
            }
            if let Some(duration) = self.duration {
                scenario.duration = duration;
            }
            if let Some(workers) = self.workers {
                scenario.pre_allocated_workers = workers;
            }
            if let Some(batch_size) = self.batch_size {
                scenario.batch_size = batch_size;
            }
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.run_config()?;

    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Unable to install the Prometheus exporter")?;
        info!("Serving metrics on {addr}");
    }

    let stats = prload::run(config).await?;
    println!("{stats}");
    Ok(())
}
