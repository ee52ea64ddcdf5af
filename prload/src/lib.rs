#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod api;
pub mod batch;
pub mod error;
pub mod ids;
pub mod operations;
pub mod run;
pub mod scenario;
pub mod setup;
pub mod shadow;

pub(crate) mod measurement;
pub(crate) mod transaction;

pub use run::{run, run_with_workload};
pub use scenario::Scenario;

pub mod prelude {
    pub use crate::api::ApiClient;
    pub use crate::error::{OperationError, RunError, SkipReason};
    pub use crate::ids::IdGenerator;
    pub use crate::operations::{BoundOperation, Operation, OperationReport, Outcome, Workload};
    pub use crate::run::{run, run_with_workload};
    pub use crate::scenario::{ConfigurableScenario, Scenario};
    pub use crate::shadow::ShadowState;

    pub use prload_core::{
        OperationKind, Profile, RunConfig, RunStatistics, ScenarioConfig, ScenarioPhase,
        ScenarioStatistics, SeedConfig,
    };
}
