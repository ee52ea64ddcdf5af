//! Configuration and statistics shared by the `prload` workload generator.
mod config;
mod constants;
mod stats;

pub use config::*;
pub use constants::*;
pub use stats::*;
