use crate::config::OperationKind;
use std::fmt;
use std::time::Duration;

/// Lifecycle of a single scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ScenarioPhase {
    #[default]
    Idle,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioPhase::Idle => "idle",
            ScenarioPhase::Running => "running",
            ScenarioPhase::Draining => "draining",
            ScenarioPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Statistics for one finished scenario.
///
/// `scheduled` counts every tick of the arrival clock. Each tick is either
/// `dropped` (no free worker and a full queue) or eventually `completed`.
/// Completed invocations are further split into `applied`, `skipped` and
/// `failed` logical outcomes; a batch invocation contributes one outcome per
/// entity it touched.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioStatistics {
    pub name: String,
    pub operation: OperationKind,
    pub scheduled: u64,
    pub dropped: u64,
    pub completed: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub requests_ok: u64,
    pub requests_err: u64,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p99: Duration,
    pub elapsed: Duration,
    pub phase: ScenarioPhase,
}

impl ScenarioStatistics {
    pub fn requests(&self) -> u64 {
        self.requests_ok + self.requests_err
    }

    pub fn error_rate(&self) -> f64 {
        if self.requests() == 0 {
            0.
        } else {
            self.requests_err as f64 / self.requests() as f64
        }
    }

    /// Achieved invocation rate per second.
    pub fn rate(&self) -> f64 {
        if self.elapsed.is_zero() {
            0.
        } else {
            self.completed as f64 / self.elapsed.as_secs_f64()
        }
    }
}

impl fmt::Display for ScenarioStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): scheduled={} dropped={} completed={} applied={} skipped={} failed={} \
             rate={:.1}/s requests={} error_rate={:.3} p50={:?} p90={:?} p99={:?} elapsed={}",
            self.name,
            self.operation,
            self.scheduled,
            self.dropped,
            self.completed,
            self.applied,
            self.skipped,
            self.failed,
            self.rate(),
            self.requests(),
            self.error_rate(),
            self.latency_p50,
            self.latency_p90,
            self.latency_p99,
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64)),
        )
    }
}

/// Outcome of the seeding phase that runs before any scenario.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub teams_created: usize,
    pub teams_failed: usize,
    pub pull_requests_created: usize,
    pub pull_requests_failed: usize,
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "teams={} (failed {}), pull_requests={} (failed {})",
            self.teams_created,
            self.teams_failed,
            self.pull_requests_created,
            self.pull_requests_failed
        )
    }
}

#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub setup: SetupReport,
    pub scenarios: Vec<ScenarioStatistics>,
    pub elapsed: Duration,
}

impl RunStatistics {
    pub fn scenario(&self, name: &str) -> Option<&ScenarioStatistics> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "setup: {}", self.setup)?;
        for scenario in &self.scenarios {
            writeln!(f, "{scenario}")?;
        }
        write!(
            f,
            "total elapsed: {}",
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64))
        )
    }
}
