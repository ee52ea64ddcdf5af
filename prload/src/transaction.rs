use crate::api::Endpoint;
use metrics_util::AtomicBucket;
use std::future::Future;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

/// Metric names recorded for each request to an endpoint.
#[derive(Copy, Clone, Debug)]
pub struct TransactionLabels {
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
}

/// Time a single request and count it as success or error.
///
/// Counts go to the task-local hook installed by the scenario worker running
/// the request. Requests issued outside a scenario (setup) only reach the
/// `metrics` recorder.
pub async fn transaction_hook<T, R, E>(endpoint: Endpoint, func: T) -> T::Output
where
    T: Future<Output = Result<R, E>>,
{
    let start = Instant::now();
    let res = func.await;
    let elapsed = start.elapsed();

    #[cfg(feature = "metrics")]
    {
        let labels = endpoint.labels();
        metrics::histogram!(labels.latency).record(elapsed.as_secs_f64());
        if res.is_ok() {
            metrics::counter!(labels.success).increment(1);
        } else {
            metrics::counter!(labels.error).increment(1);
        }
    }

    if TRANSACTION_HOOK
        .try_with(|hook| hook.record(res.is_ok(), elapsed))
        .is_err()
    {
        tracing::trace!("No hook available for {endpoint}.");
    }

    res
}

#[derive(Clone)]
pub(crate) struct TransactionData {
    pub success: Arc<AtomicU64>,
    pub error: Arc<AtomicU64>,
    pub latency: Arc<AtomicBucket<Duration>>,
}

impl TransactionData {
    fn record(&self, ok: bool, elapsed: Duration) {
        if ok {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error.fetch_add(1, Ordering::Relaxed);
        }
        self.latency.push(elapsed);
    }
}

tokio::task_local! {
    pub(crate) static TRANSACTION_HOOK: TransactionData;
}
