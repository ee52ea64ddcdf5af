use crate::measurement::Measurement;
use crate::operations::OperationReport;
use crate::transaction::TransactionData;
use metrics_util::AtomicBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Invocation counters shared between the dispatcher and the workers.
#[derive(Debug, Default)]
pub(crate) struct InvocationCounters {
    pub scheduled: AtomicU64,
    pub dropped: AtomicU64,
    pub completed: AtomicU64,
    pub applied: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
}

impl InvocationCounters {
    pub fn record(&self, report: OperationReport) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.applied.fetch_add(report.applied, Ordering::Relaxed);
        self.skipped.fetch_add(report.skipped, Ordering::Relaxed);
        self.failed.fetch_add(report.failed, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

pub(crate) struct TaskAtomics {
    counters: Arc<InvocationCounters>,
    success: Arc<AtomicU64>,
    error: Arc<AtomicU64>,
    latency: Arc<AtomicBucket<Duration>>,
}

impl TaskAtomics {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(InvocationCounters::default()),
            success: Arc::new(AtomicU64::new(0)),
            error: Arc::new(AtomicU64::new(0)),
            latency: Arc::new(AtomicBucket::new()),
        }
    }

    pub fn counters(&self) -> Arc<InvocationCounters> {
        self.counters.clone()
    }

    pub fn clone_to_transaction_data(&self) -> TransactionData {
        TransactionData {
            success: self.success.clone(),
            error: self.error.clone(),
            latency: self.latency.clone(),
        }
    }

    /// Drain the request counters into a window measurement. Every latency is
    /// also folded into `overall`.
    pub fn collect(&self, elapsed: Duration, overall: &mut Measurement) -> Measurement {
        let success = self.success.swap(0, Ordering::Relaxed);
        let error = self.error.swap(0, Ordering::Relaxed);
        let mut measurement = Measurement::new(success, error, elapsed);
        self.latency.clear_with(|dur| {
            measurement.populate_latencies(dur);
            overall.populate_latencies(dur);
        });
        overall.add_counts(&measurement);
        measurement
    }
}
