use crate::constants::*;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Scenario `{0}` needs at least one worker")]
    NoWorkers(String),

    #[error("Scenario `{0}` has a zero duration")]
    ZeroDuration(String),

    #[error("Scenario `{0}` has a zero time unit")]
    ZeroTimeUnit(String),

    #[error("Scenario `{0}` has a zero batch size")]
    ZeroBatchSize(String),

    #[error("Scenario `{0}` has a zero queue capacity")]
    ZeroQueueCapacity(String),

    #[error("Run has no scenarios")]
    NoScenarios,

    #[error("Unknown profile `{0}` (expected mixed, mixed-activity or reassign-batch)")]
    UnknownProfile(String),
}

/// The logical operation a scenario fires on every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateTeam,
    CreatePullRequest,
    MergePullRequest,
    ReassignReviewer,
    QueryTeam,
    QueryUserReviews,
    SetUserActive,
    BatchReassign,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateTeam => "create_team",
            OperationKind::CreatePullRequest => "create_pull_request",
            OperationKind::MergePullRequest => "merge_pull_request",
            OperationKind::ReassignReviewer => "reassign_reviewer",
            OperationKind::QueryTeam => "query_team",
            OperationKind::QueryUserReviews => "query_user_reviews",
            OperationKind::SetUserActive => "set_user_active",
            OperationKind::BatchReassign => "batch_reassign",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub operation: OperationKind,
    /// Invocations per `time_unit`.
    pub rate: NonZeroU32,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "default_time_unit")]
    pub time_unit: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub pre_allocated_workers: usize,
    /// Ticks that may wait for a free worker. Defaults to the worker count.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_time_unit() -> Duration {
    DEFAULT_TIME_UNIT
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl ScenarioConfig {
    pub fn new(name: &str, operation: OperationKind) -> Self {
        Self {
            name: name.to_string(),
            operation,
            rate: DEFAULT_RATE,
            time_unit: DEFAULT_TIME_UNIT,
            duration: DEFAULT_DURATION,
            pre_allocated_workers: DEFAULT_PREALLOCATED_WORKERS,
            queue_capacity: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Interval between two consecutive ticks.
    pub fn period(&self) -> Duration {
        self.time_unit / self.rate.get()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.pre_allocated_workers)
    }

    /// Number of ticks a perfectly paced run of this scenario would dispatch.
    pub fn expected_invocations(&self) -> f64 {
        self.rate.get() as f64 * self.duration.as_secs_f64() / self.time_unit.as_secs_f64()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pre_allocated_workers == 0 {
            return Err(ConfigError::NoWorkers(self.name.clone()));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration(self.name.clone()));
        }
        if self.time_unit.is_zero() {
            return Err(ConfigError::ZeroTimeUnit(self.name.clone()));
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity(self.name.clone()));
        }
        if self.operation == OperationKind::BatchReassign && self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub teams: usize,
    pub members_per_team: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            teams: DEFAULT_SEED_TEAMS,
            members_per_team: DEFAULT_SEED_MEMBERS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub seed: SeedConfig,
    pub scenarios: Vec<ScenarioConfig>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl RunConfig {
    pub fn from_profile(profile: Profile) -> Self {
        match profile {
            Profile::Mixed => Self {
                base_url: default_base_url(),
                seed: SeedConfig::default(),
                scenarios: [
                    ("add_team", OperationKind::CreateTeam),
                    ("create_pr", OperationKind::CreatePullRequest),
                    ("merge_pr", OperationKind::MergePullRequest),
                    ("reassign_reviewer", OperationKind::ReassignReviewer),
                    ("get_team_info", OperationKind::QueryTeam),
                    ("get_user_prs", OperationKind::QueryUserReviews),
                ]
                .into_iter()
                .map(|(name, op)| ScenarioConfig::new(name, op))
                .collect(),
            },
            Profile::MixedActivity => Self {
                base_url: default_base_url(),
                seed: SeedConfig {
                    teams: DEFAULT_SEED_TEAMS,
                    members_per_team: 10,
                },
                scenarios: [
                    ("add_team", OperationKind::CreateTeam),
                    ("create_pr", OperationKind::CreatePullRequest),
                    ("merge_pr", OperationKind::MergePullRequest),
                    ("get_team_info", OperationKind::QueryTeam),
                    ("get_user_prs", OperationKind::QueryUserReviews),
                    ("set_is_active", OperationKind::SetUserActive),
                ]
                .into_iter()
                .map(|(name, op)| {
                    let mut config = ScenarioConfig::new(name, op);
                    config.rate = HIGH_RATE;
                    config
                })
                .collect(),
            },
            Profile::ReassignBatch => {
                let mut config =
                    ScenarioConfig::new("reassign_reviewer", OperationKind::BatchReassign);
                config.rate = HIGH_RATE;
                config.pre_allocated_workers = 1;
                Self {
                    base_url: default_base_url(),
                    seed: SeedConfig {
                        teams: 15,
                        members_per_team: 20,
                    },
                    scenarios: vec![config],
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios.is_empty() {
            return Err(ConfigError::NoScenarios);
        }
        self.scenarios.iter().try_for_each(ScenarioConfig::validate)
    }

    /// Upper bound on run time, ignoring drain.
    pub fn longest_duration(&self) -> Duration {
        self.scenarios
            .iter()
            .map(|s| s.duration)
            .max()
            .unwrap_or_default()
    }
}

/// Preset workloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Profile {
    /// Team creation, PR lifecycle, single reassignment and read traffic.
    #[default]
    Mixed,
    /// The mixed workload without reassignment, plus user activity toggling.
    MixedActivity,
    /// A single high-throughput batch reassignment scenario.
    ReassignBatch,
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mixed" => Ok(Profile::Mixed),
            "mixed-activity" => Ok(Profile::MixedActivity),
            "reassign-batch" => Ok(Profile::ReassignBatch),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Mixed => "mixed",
            Profile::MixedActivity => "mixed-activity",
            Profile::ReassignBatch => "reassign-batch",
        };
        f.write_str(name)
    }
}
