use crate::api::Endpoint;
use prload_core::ConfigError;
use reqwest::StatusCode;
use thiserror::Error;

/// A request that did not produce the expected response.
///
/// Every variant is recoverable: it is counted and logged by the scheduler and
/// the shadow state is left untouched.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{endpoint}: transport failure: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint}: unexpected status {status} ({})", .code.as_deref().unwrap_or("no error code"))]
    UnexpectedStatus {
        endpoint: Endpoint,
        status: StatusCode,
        code: Option<String>,
    },

    #[error("{endpoint}: malformed response body: {source}")]
    MalformedResponse {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
}

impl OperationError {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            OperationError::Transport { endpoint, .. }
            | OperationError::UnexpectedStatus { endpoint, .. }
            | OperationError::MalformedResponse { endpoint, .. } => *endpoint,
        }
    }

    /// Status the service answered with, if it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            OperationError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why an operation finished without changing the shadow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTeams,
    NoUsers,
    NoPullRequests,
    NoReviewers,
    AlreadyMerged,
    StaleReviewer,
    UnknownPullRequest,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Scenario task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
