use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Request counts and latency distribution over some window.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub success: u64,
    pub error: u64,
    pub elapsed: Duration,
    latency: TDigest<K1>,
    latency_count: usize,
}

impl Default for Measurement {
    fn default() -> Self {
        Self::new(0, 0, Duration::ZERO)
    }
}

impl Measurement {
    pub fn new(success: u64, error: u64, elapsed: Duration) -> Self {
        Self {
            success,
            error,
            elapsed,
            latency: default_tdigest(),
            latency_count: 0,
        }
    }

    /// Fold another window's counts into this one. Latencies are fed
    /// separately through [`Measurement::populate_latencies`].
    pub fn add_counts(&mut self, other: &Measurement) {
        self.success += other.success;
        self.error += other.error;
        self.elapsed += other.elapsed;
    }

    pub fn populate_latencies(&mut self, dur: &[Duration]) {
        for latency in dur {
            self.latency.insert(latency.as_secs_f64());
        }
        self.latency_count += dur.len();
    }

    pub fn total(&self) -> u64 {
        self.success + self.error
    }

    /// Requests per second.
    pub fn tps(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.
        } else {
            self.total() as f64 / self.elapsed.as_secs_f64()
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total() == 0 {
            0.
        } else {
            self.error as f64 / self.total() as f64
        }
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.latency_count == 0 {
            return Duration::ZERO;
        }

        let secs = self.latency.quantile(quantile);

        // TDigest occasionally yields NaN for sparse data.
        let secs = if secs.is_finite() {
            secs.max(0.)
        } else {
            error!("NaN latency calculation.");
            0.
        };

        Duration::from_secs_f64(secs)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TPS={:.2}, ErrorRate={:.2}, p50={:?}, p90={:?}, p99={:?}",
            self.tps(),
            self.error_rate(),
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.99),
        )
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
