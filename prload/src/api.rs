//! Typed client for the team/pull-request/review service.
mod types;

pub use types::*;

use crate::error::OperationError;
use crate::transaction::{transaction_hook, TransactionLabels};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The endpoints exercised by the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TeamAdd,
    TeamGet,
    PullRequestCreate,
    PullRequestMerge,
    PullRequestReassign,
    UsersGetReview,
    UsersSetIsActive,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::TeamAdd => "/team/add",
            Endpoint::TeamGet => "/team/get",
            Endpoint::PullRequestCreate => "/pullRequest/create",
            Endpoint::PullRequestMerge => "/pullRequest/merge",
            Endpoint::PullRequestReassign => "/pullRequest/reassign",
            Endpoint::UsersGetReview => "/users/getReview",
            Endpoint::UsersSetIsActive => "/users/setIsActive",
        }
    }

    /// Status the service answers with on success.
    pub fn expected_status(&self) -> StatusCode {
        match self {
            Endpoint::TeamAdd | Endpoint::PullRequestCreate => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }

    pub(crate) fn labels(&self) -> TransactionLabels {
        macro_rules! labels {
            ($base:literal) => {
                TransactionLabels {
                    success: concat!("prload_", $base, "_success"),
                    error: concat!("prload_", $base, "_error"),
                    latency: concat!("prload_", $base, "_latency"),
                }
            };
        }

        match self {
            Endpoint::TeamAdd => labels!("team_add"),
            Endpoint::TeamGet => labels!("team_get"),
            Endpoint::PullRequestCreate => labels!("pull_request_create"),
            Endpoint::PullRequestMerge => labels!("pull_request_merge"),
            Endpoint::PullRequestReassign => labels!("pull_request_reassign"),
            Endpoint::UsersGetReview => labels!("users_get_review"),
            Endpoint::UsersSetIsActive => labels!("users_set_is_active"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn add_team(&self, team: &TeamAddRequest) -> Result<TeamAddResponse, OperationError> {
        let endpoint = Endpoint::TeamAdd;
        self.execute(endpoint, self.http.post(self.url(endpoint)).json(team))
            .await
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team, OperationError> {
        let endpoint = Endpoint::TeamGet;
        self.execute(
            endpoint,
            self.http
                .get(self.url(endpoint))
                .query(&[("team_name", team_name)]),
        )
        .await
    }

    pub async fn create_pull_request(
        &self,
        request: &CreatePullRequest,
    ) -> Result<PullRequestResponse, OperationError> {
        let endpoint = Endpoint::PullRequestCreate;
        self.execute(endpoint, self.http.post(self.url(endpoint)).json(request))
            .await
    }

    pub async fn merge_pull_request(
        &self,
        request: &MergePullRequest,
    ) -> Result<PullRequestResponse, OperationError> {
        let endpoint = Endpoint::PullRequestMerge;
        self.execute(endpoint, self.http.post(self.url(endpoint)).json(request))
            .await
    }

    pub async fn reassign_reviewer(
        &self,
        request: &ReassignReviewer,
    ) -> Result<ReassignResponse, OperationError> {
        let endpoint = Endpoint::PullRequestReassign;
        self.execute(endpoint, self.http.post(self.url(endpoint)).json(request))
            .await
    }

    pub async fn get_review(&self, user_id: &str) -> Result<UserReviews, OperationError> {
        let endpoint = Endpoint::UsersGetReview;
        self.execute(
            endpoint,
            self.http
                .get(self.url(endpoint))
                .query(&[("user_id", user_id)]),
        )
        .await
    }

    pub async fn set_is_active(&self, request: &SetIsActive) -> Result<UserResponse, OperationError> {
        let endpoint = Endpoint::UsersSetIsActive;
        self.execute(endpoint, self.http.post(self.url(endpoint)).json(request))
            .await
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<R, OperationError> {
        transaction_hook(endpoint, async move {
            let res = request
                .send()
                .await
                .map_err(|source| OperationError::Transport { endpoint, source })?;

            let status = res.status();
            let body = res
                .bytes()
                .await
                .map_err(|source| OperationError::Transport { endpoint, source })?;

            if status != endpoint.expected_status() {
                let code = serde_json::from_slice::<ErrorResponse>(&body)
                    .ok()
                    .map(|e| e.error.code);
                return Err(OperationError::UnexpectedStatus {
                    endpoint,
                    status,
                    code,
                });
            }

            serde_json::from_slice(&body)
                .map_err(|source| OperationError::MalformedResponse { endpoint, source })
        })
        .await
    }
}
