//! Whole-run orchestration: seed, then run every scenario concurrently.
use crate::api::ApiClient;
use crate::error::RunError;
use crate::operations::{BoundOperation, Workload};
use crate::scenario::Scenario;
use crate::setup;
use prload_core::{RunConfig, RunStatistics};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Seed the service reachable at `config.base_url`, then run the configured
/// scenarios.
pub async fn run(config: RunConfig) -> Result<RunStatistics, RunError> {
    let client = ApiClient::new(&config.base_url)?;
    run_with_workload(config, Arc::new(Workload::new(client))).await
}

/// Like [`run`], against a caller-provided workload.
#[instrument(name = "run", skip_all, fields(run_tag = wl.ids().run_tag()))]
pub async fn run_with_workload(
    config: RunConfig,
    wl: Arc<Workload>,
) -> Result<RunStatistics, RunError> {
    config.validate()?;
    info!(
        "Starting run against {} with {} scenarios",
        wl.client().base_url(),
        config.scenarios.len()
    );

    let start = Instant::now();
    let setup = setup::seed(&wl, &config.seed).await;
    if setup.teams_created == 0 {
        warn!("No seed teams were created; operations will mostly skip");
    }

    let mut set = JoinSet::new();
    for (idx, scenario) in config.scenarios.into_iter().enumerate() {
        let operation =
            BoundOperation::new(scenario.operation, wl.clone()).batch_size(scenario.batch_size);
        set.spawn(
            async move { (idx, Scenario::with_config(scenario, operation).await) }
                .in_current_span(),
        );
    }

    let mut scenarios = Vec::with_capacity(set.len());
    while let Some(res) = set.join_next().await {
        scenarios.push(res?);
    }
    // Report in configuration order.
    scenarios.sort_by_key(|(idx, _)| *idx);

    let stats = RunStatistics {
        setup,
        scenarios: scenarios.into_iter().map(|(_, stats)| stats).collect(),
        elapsed: start.elapsed(),
    };
    info!(
        "Run complete: shadow holds {} teams, {} users, {} pull requests",
        wl.shadow().team_count(),
        wl.shadow().user_count(),
        wl.shadow().pull_request_count()
    );
    Ok(stats)
}
