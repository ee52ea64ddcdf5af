//! Open-model scenario scheduling.
//!
//! A scenario dispatches its operation at a fixed arrival rate, independent
//! of how long invocations take. Ticks are handed to a pool of pre-allocated
//! workers through a bounded queue; a tick that finds the queue full is
//! dropped and counted rather than delaying the clock.
use crate::measurement::Measurement;
use crate::operations::{Operation, OperationReport};
use crate::transaction::TRANSACTION_HOOK;
use async_channel::TrySendError;
use futures_util::FutureExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use prload_core::{ScenarioConfig, ScenarioPhase, ScenarioStatistics, REPORT_INTERVAL};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::{
    future::Future,
    num::NonZeroU32,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

mod task_atomics;
mod timer;

use task_atomics::{InvocationCounters, TaskAtomics};
use timer::Timer;

/// A configured scenario. Awaiting it runs the scenario to completion and
/// yields its statistics.
///
/// # Example
/// ```no_run
/// use prload::prelude::*;
/// use std::num::NonZeroU32;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn run(workload: Arc<Workload>) {
/// let stats = Scenario::new(
///     "merges",
///     BoundOperation::new(OperationKind::MergePullRequest, workload),
/// )
/// .rate(NonZeroU32::new(10).unwrap())
/// .duration(Duration::from_secs(30))
/// .await;
/// # }
/// ```
#[pin_project::pin_project]
pub struct Scenario<O> {
    operation: Arc<O>,
    runner_fut: Option<Pin<Box<dyn Future<Output = ScenarioStatistics> + Send>>>,
    config: ScenarioConfig,
    phase: Arc<watch::Sender<ScenarioPhase>>,
}

impl<O> Scenario<O> {
    /// Bind `operation` to a scenario with default pacing.
    pub fn new(name: &str, operation: O) -> Self
    where
        O: BindsKind,
    {
        let config = ScenarioConfig::new(name, operation.operation_kind());
        Self::with_config(config, operation)
    }

    pub fn with_config(config: ScenarioConfig, operation: O) -> Self {
        let (phase, _) = watch::channel(ScenarioPhase::Idle);
        Self {
            operation: Arc::new(operation),
            runner_fut: None,
            config,
            phase: Arc::new(phase),
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Observe phase transitions (`Idle` → `Running` → `Draining` → `Stopped`).
    pub fn subscribe(&self) -> watch::Receiver<ScenarioPhase> {
        self.phase.subscribe()
    }
}

/// Operations that know which [`prload_core::OperationKind`] they perform.
pub trait BindsKind {
    fn operation_kind(&self) -> prload_core::OperationKind;
}

impl BindsKind for crate::operations::BoundOperation {
    fn operation_kind(&self) -> prload_core::OperationKind {
        self.kind()
    }
}

impl<O> Future for Scenario<O>
where
    O: Operation + Sync + 'static,
{
    type Output = ScenarioStatistics;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let operation = self.operation.clone();
            let config = self.config.clone();
            let phase = self.phase.clone();
            self.runner_fut = Some(Box::pin(async move {
                run_scenario(operation, config, phase).await
            }));
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

pub trait ConfigurableScenario<T: Send>: Future<Output = T> + Sized + Send {
    fn rate(self, rate: NonZeroU32) -> Self;
    fn time_unit(self, time_unit: Duration) -> Self;
    fn duration(self, duration: Duration) -> Self;
    fn workers(self, workers: usize) -> Self;
    fn queue_capacity(self, capacity: usize) -> Self;
}

impl<O> ConfigurableScenario<ScenarioStatistics> for Scenario<O>
where
    O: Operation + Sync + 'static,
{
    /// Invocations started per `time_unit`.
    fn rate(mut self, rate: NonZeroU32) -> Self {
        self.config.rate = rate;
        self
    }

    fn time_unit(mut self, time_unit: Duration) -> Self {
        self.config.time_unit = time_unit;
        self
    }

    fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Number of concurrent execution contexts.
    fn workers(mut self, workers: usize) -> Self {
        self.config.pre_allocated_workers = workers;
        self
    }

    /// Ticks that may wait for a free worker before new ones are dropped.
    fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }
}

#[instrument(name = "scenario", skip_all, fields(name = config.name))]
pub(crate) async fn run_scenario<O>(
    operation: Arc<O>,
    config: ScenarioConfig,
    phase: Arc<watch::Sender<ScenarioPhase>>,
) -> ScenarioStatistics
where
    O: Operation + Sync + 'static,
{
    info!("Running {} with config {:?}", config.name, &config);

    let start = Instant::now();
    let atomics = TaskAtomics::new();
    let counters = atomics.counters();
    let (tx, rx) = async_channel::bounded::<()>(config.queue_capacity().max(1));

    let workers: Vec<JoinHandle<()>> = (0..config.pre_allocated_workers)
        .map(|_| {
            let worker = worker(operation.clone(), rx.clone(), atomics.counters());
            tokio::spawn(
                TRANSACTION_HOOK
                    .scope(atomics.clone_to_transaction_data(), worker)
                    .in_current_span(),
            )
        })
        .collect();
    drop(rx);

    let limiter = arrival_limiter(config.period());
    let deadline = tokio::time::sleep_until(start + config.duration);
    tokio::pin!(deadline);
    let mut timer = Timer::new(REPORT_INTERVAL).await;
    let mut overall = Measurement::default();

    set_phase(&phase, ScenarioPhase::Running);
    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => break,
            _ = limiter.until_ready() => {
                counters.scheduled.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                match tx.try_send(()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(())) => {
                        trace!("All workers busy; dropping tick");
                        counters.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        #[cfg(feature = "metrics")]
                        metrics::counter!(format!("prload_{}_dropped", config.name)).increment(1);
                    }
                    Err(TrySendError::Closed(())) => {
                        error!("Every worker of {} exited early", config.name);
                        counters.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        break;
                    }
                }
            }
            elapsed = timer.tick() => {
                let window = atomics.collect(elapsed, &mut overall);
                debug!("{} [{timer}]: {window}", config.name);
            }
        }
    }

    set_phase(&phase, ScenarioPhase::Draining);
    debug!("Draining {} queued ticks", tx.len());
    tx.close();
    for handle in workers {
        if let Err(err) = handle.await {
            error!("Worker of {} failed: {err}", config.name);
        }
    }

    let window = atomics.collect(timer.since_last_tick(), &mut overall);
    trace!("Final window: {window}");
    set_phase(&phase, ScenarioPhase::Stopped);

    let stats = ScenarioStatistics {
        name: config.name.clone(),
        operation: config.operation,
        scheduled: InvocationCounters::get(&counters.scheduled),
        dropped: InvocationCounters::get(&counters.dropped),
        completed: InvocationCounters::get(&counters.completed),
        applied: InvocationCounters::get(&counters.applied),
        skipped: InvocationCounters::get(&counters.skipped),
        failed: InvocationCounters::get(&counters.failed),
        requests_ok: overall.success,
        requests_err: overall.error,
        latency_p50: overall.latency(0.5),
        latency_p90: overall.latency(0.9),
        latency_p99: overall.latency(0.99),
        elapsed: start.elapsed(),
        phase: ScenarioPhase::Stopped,
    };
    info!("Scenario complete: {stats}");
    stats
}

/// Pull ticks until the queue is closed and empty.
async fn worker<O>(
    operation: Arc<O>,
    rx: async_channel::Receiver<()>,
    counters: Arc<InvocationCounters>,
) where
    O: Operation + Sync + 'static,
{
    let mut rng = SmallRng::from_entropy();
    while rx.recv().await.is_ok() {
        match AssertUnwindSafe(operation.invoke(&mut rng))
            .catch_unwind()
            .await
        {
            Ok(report) => counters.record(report),
            Err(_) => {
                error!("Invocation panicked; counting it as failed");
                counters.record(OperationReport {
                    failed: 1,
                    ..Default::default()
                });
            }
        }
    }
}

fn set_phase(phase: &watch::Sender<ScenarioPhase>, next: ScenarioPhase) {
    debug!("Phase -> {next}");
    // No subscribers is fine.
    phase.send_replace(next);
}

/// Up to one period of wake-up lag is caught up rather than turned into drift.
const ARRIVAL_BURST: NonZeroU32 = unsafe { NonZeroU32::new_unchecked(2) };

fn arrival_limiter(period: Duration) -> DefaultDirectRateLimiter {
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(ARRIVAL_BURST);
    RateLimiter::direct(quota)
}
