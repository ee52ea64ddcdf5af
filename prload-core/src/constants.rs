use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Arrival rate used by the `mixed` profile.
pub const DEFAULT_RATE: NonZeroU32 = unsafe { NonZeroU32::new_unchecked(10) };

/// Arrival rate used by the `mixed-activity` and `reassign-batch` profiles.
pub const HIGH_RATE: NonZeroU32 = unsafe { NonZeroU32::new_unchecked(100) };

pub const DEFAULT_TIME_UNIT: Duration = Duration::from_secs(1);

pub const DEFAULT_DURATION: Duration = Duration::from_secs(120);

pub const DEFAULT_PREALLOCATED_WORKERS: usize = 10;

/// Number of pull requests sampled per batch reassignment invocation.
pub const DEFAULT_BATCH_SIZE: usize = 10;

pub const DEFAULT_SEED_TEAMS: usize = 10;
pub const DEFAULT_SEED_MEMBERS: usize = 7;

/// Members in a team created by the `create_team` operation during traffic.
pub const DYNAMIC_TEAM_SIZE: usize = 2;

/// Interval at which each scenario logs a progress measurement.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);
