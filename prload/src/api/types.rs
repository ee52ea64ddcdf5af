//! Request and response bodies of the service under test.
//!
//! Required fields are plain (non-optional) so a response missing them fails
//! to decode and is reported as malformed.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

/// `POST /team/add`
pub type TeamAddRequest = Team;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamAddResponse {
    pub team: Team,
}

/// `POST /pullRequest/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    /// Some service builds encode an empty reviewer list as `null`.
    #[serde(default)]
    assigned_reviewers: Option<Vec<String>>,
}

impl PullRequest {
    pub fn assigned_reviewers(&self) -> &[String] {
        self.assigned_reviewers.as_deref().unwrap_or_default()
    }

    pub fn into_assigned_reviewers(self) -> Vec<String> {
        self.assigned_reviewers.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestResponse {
    pub pr: PullRequest,
}

/// `POST /pullRequest/merge`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePullRequest {
    pub pull_request_id: String,
}

/// `POST /pullRequest/reassign`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignReviewer {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReassignResponse {
    #[serde(default)]
    pub pr: Option<PullRequest>,
    pub replaced_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// `GET /users/getReview`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserReviews {
    pub user_id: String,
    #[serde(default)]
    pull_requests: Option<Vec<PullRequestShort>>,
}

impl UserReviews {
    pub fn pull_requests(&self) -> &[PullRequestShort] {
        self.pull_requests.as_deref().unwrap_or_default()
    }
}

/// `POST /users/setIsActive`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetIsActive {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
