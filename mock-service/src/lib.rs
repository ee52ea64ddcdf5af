//! In-memory stand-in for the team / pull-request / review service.
use axum::{
    debug_handler,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info, warn};

/// Behaviour knobs of the mock.
#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Reviewers assigned to a new pull request, at most.
    pub reviewers_per_pr: usize,
    /// Pick reviewer candidates at random instead of in membership order.
    pub random_choice: bool,
    /// Each request sleeps for a uniform random time up to this bound.
    pub max_jitter: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            reviewers_per_pr: 2,
            random_choice: true,
            max_jitter: Duration::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    TeamAdd,
    TeamGet,
    PullRequestCreate,
    PullRequestMerge,
    PullRequestReassign,
    UsersGetReview,
    UsersSetIsActive,
}

const ROUTE_COUNT: usize = Route::UsersSetIsActive as usize + 1;

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::TeamAdd => "/team/add",
            Route::TeamGet => "/team/get",
            Route::PullRequestCreate => "/pullRequest/create",
            Route::PullRequestMerge => "/pullRequest/merge",
            Route::PullRequestReassign => "/pullRequest/reassign",
            Route::UsersGetReview => "/users/getReview",
            Route::UsersSetIsActive => "/users/setIsActive",
        }
    }
}

/* Wire types */

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Open,
    Merged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: Status,
    pub assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<String>,
}

#[derive(Serialize)]
struct PullRequestShort {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: Status,
}

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

#[derive(Deserialize)]
struct CreatePullRequest {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
}

#[derive(Deserialize)]
struct MergePullRequest {
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignReviewer {
    pull_request_id: String,
    old_user_id: String,
}

#[derive(Deserialize)]
struct SetIsActive {
    user_id: String,
    is_active: bool,
}

#[derive(Deserialize)]
struct TeamQuery {
    team_name: String,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

/* Errors */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    TeamExists,
    PullRequestExists,
    PullRequestMerged,
    NotAssigned,
    NoCandidate,
    NotFound,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::TeamExists => "TEAM_EXISTS",
            ApiError::PullRequestExists => "PR_EXISTS",
            ApiError::PullRequestMerged => "PR_MERGED",
            ApiError::NotAssigned => "NOT_ASSIGNED",
            ApiError::NoCandidate => "NO_CANDIDATE",
            ApiError::NotFound => "NOT_FOUND",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::TeamExists => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::TeamExists => "team_name already exists",
            ApiError::PullRequestExists => "PR id already exists",
            ApiError::PullRequestMerged => "cannot reassign on merged PR",
            ApiError::NotAssigned => "reviewer is not assigned to this PR",
            ApiError::NoCandidate => "no active replacement candidate in team",
            ApiError::NotFound => "resource not found",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.message(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/* State */

#[derive(Debug)]
struct UserRecord {
    username: String,
    team_name: String,
    is_active: bool,
}

#[derive(Debug, Default)]
struct Store {
    /// Member ids per team, in insertion order.
    teams: HashMap<String, Vec<String>>,
    users: HashMap<String, UserRecord>,
    pull_requests: HashMap<String, PullRequest>,
}

impl Store {
    fn user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|u| User {
            user_id: user_id.to_string(),
            username: u.username.clone(),
            team_name: u.team_name.clone(),
            is_active: u.is_active,
        })
    }

    fn team(&self, team_name: &str) -> Option<Team> {
        let members: Vec<TeamMember> = self
            .teams
            .get(team_name)?
            .iter()
            .filter_map(|id| {
                self.users.get(id).map(|u| TeamMember {
                    user_id: id.clone(),
                    username: u.username.clone(),
                    is_active: u.is_active,
                })
            })
            .collect();

        if members.is_empty() {
            None
        } else {
            Some(Team {
                team_name: team_name.to_string(),
                members,
            })
        }
    }

    /// Active members of `team_name` not in `excluded`, in membership order.
    fn candidates(&self, team_name: &str, excluded: &[&str]) -> Vec<String> {
        self.teams
            .get(team_name)
            .into_iter()
            .flatten()
            .filter(|id| !excluded.contains(&id.as_str()))
            .filter(|id| self.users.get(*id).is_some_and(|u| u.is_active))
            .cloned()
            .collect()
    }
}

pub struct AppState {
    config: MockConfig,
    store: Mutex<Store>,
    requests: [AtomicU64; ROUTE_COUNT],
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            store: Mutex::new(Store::default()),
            requests: Default::default(),
        }
    }

    /// Requests received on `route`, including rejected ones.
    pub fn requests(&self, route: Route) -> u64 {
        self.requests[route as usize].load(Ordering::Relaxed)
    }

    pub fn pull_request(&self, pull_request_id: &str) -> Option<PullRequest> {
        self.store().pull_requests.get(pull_request_id).cloned()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.store().pull_requests.values().cloned().collect()
    }

    pub fn team(&self, team_name: &str) -> Option<Team> {
        self.store().team(team_name)
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.store().user(user_id)
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, route: Route) {
        self.requests[route as usize].fetch_add(1, Ordering::Relaxed);
        counter!("mock_service.requests", "route" => route.path()).increment(1);

        if !self.config.max_jitter.is_zero() {
            let jitter = rand::thread_rng().gen_range(Duration::ZERO..=self.config.max_jitter);
            tokio::time::sleep(jitter).await;
        }
    }

    fn choose(&self, mut candidates: Vec<String>, count: usize) -> Vec<String> {
        if self.config.random_choice {
            candidates.shuffle(&mut rand::thread_rng());
        }
        candidates.truncate(count);
        candidates
    }
}

/* Routes */

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(Route::TeamAdd.path(), post(team_add))
        .route(Route::TeamGet.path(), get(team_get))
        .route(Route::PullRequestCreate.path(), post(pull_request_create))
        .route(Route::PullRequestMerge.path(), post(pull_request_merge))
        .route(Route::PullRequestReassign.path(), post(pull_request_reassign))
        .route(Route::UsersGetReview.path(), get(users_get_review))
        .route(Route::UsersSetIsActive.path(), post(users_set_is_active))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `addr` until the process exits.
pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(Arc::new(AppState::new(config)))).await?;
    Ok(())
}

/// Serve on an ephemeral local port in the background.
pub async fn spawn(config: MockConfig) -> anyhow::Result<(SocketAddr, Arc<AppState>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(AppState::new(config));

    let app = router(state.clone());
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("Mock service stopped: {err}");
        }
    });

    Ok((addr, state))
}

#[debug_handler]
async fn team_add(
    State(state): State<Arc<AppState>>,
    Json(team): Json<Team>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiError> {
    state.enter(Route::TeamAdd).await;
    let mut store = state.store();

    if store.teams.contains_key(&team.team_name) {
        return Err(ApiError::TeamExists);
    }

    let mut member_ids = Vec::with_capacity(team.members.len());
    for member in &team.members {
        // Known users move to the new team.
        if let Some(previous) = store.users.get(&member.user_id).map(|u| u.team_name.clone()) {
            if let Some(ids) = store.teams.get_mut(&previous) {
                ids.retain(|id| id != &member.user_id);
            }
        }
        store.users.insert(
            member.user_id.clone(),
            UserRecord {
                username: member.username.clone(),
                team_name: team.team_name.clone(),
                is_active: member.is_active,
            },
        );
        if !member_ids.contains(&member.user_id) {
            member_ids.push(member.user_id.clone());
        }
    }
    store.teams.insert(team.team_name.clone(), member_ids);
    debug!("Created team {}", team.team_name);

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

#[derive(Serialize)]
struct TeamResponse {
    team: Team,
}

#[debug_handler]
async fn team_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Team>, ApiError> {
    state.enter(Route::TeamGet).await;
    state
        .store()
        .team(&query.team_name)
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[derive(Serialize)]
struct PullRequestResponse {
    pr: PullRequest,
}

#[debug_handler]
async fn pull_request_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePullRequest>,
) -> Result<(StatusCode, Json<PullRequestResponse>), ApiError> {
    state.enter(Route::PullRequestCreate).await;
    let mut store = state.store();

    let team_name = store
        .users
        .get(&req.author_id)
        .map(|u| u.team_name.clone())
        .ok_or(ApiError::NotFound)?;
    if store.pull_requests.contains_key(&req.pull_request_id) {
        return Err(ApiError::PullRequestExists);
    }

    let candidates = store.candidates(&team_name, &[&req.author_id]);
    let pr = PullRequest {
        pull_request_id: req.pull_request_id,
        pull_request_name: req.pull_request_name,
        author_id: req.author_id,
        status: Status::Open,
        assigned_reviewers: state.choose(candidates, state.config.reviewers_per_pr),
        created_at: now(),
        merged_at: None,
    };
    store
        .pull_requests
        .insert(pr.pull_request_id.clone(), pr.clone());

    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr })))
}

#[debug_handler]
async fn pull_request_merge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MergePullRequest>,
) -> Result<Json<PullRequestResponse>, ApiError> {
    state.enter(Route::PullRequestMerge).await;
    let mut store = state.store();

    let pr = store
        .pull_requests
        .get_mut(&req.pull_request_id)
        .ok_or(ApiError::NotFound)?;
    if pr.status == Status::Open {
        pr.status = Status::Merged;
        pr.merged_at = Some(now());
    }

    Ok(Json(PullRequestResponse { pr: pr.clone() }))
}

#[derive(Serialize)]
struct ReassignResponse {
    pr: PullRequest,
    replaced_by: String,
}

#[debug_handler]
async fn pull_request_reassign(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReassignReviewer>,
) -> Result<Json<ReassignResponse>, ApiError> {
    state.enter(Route::PullRequestReassign).await;
    let mut store = state.store();

    let team_name = store
        .users
        .get(&req.old_user_id)
        .map(|u| u.team_name.clone())
        .ok_or(ApiError::NotFound)?;
    let pr = store
        .pull_requests
        .get(&req.pull_request_id)
        .ok_or(ApiError::NotFound)?;
    if pr.status == Status::Merged {
        return Err(ApiError::PullRequestMerged);
    }
    if !pr.assigned_reviewers.contains(&req.old_user_id) {
        return Err(ApiError::NotAssigned);
    }

    let mut excluded: Vec<&str> = vec![&pr.author_id];
    excluded.extend(pr.assigned_reviewers.iter().map(String::as_str));
    let candidates = store.candidates(&team_name, &excluded);
    let replaced_by = state
        .choose(candidates, 1)
        .pop()
        .ok_or(ApiError::NoCandidate)?;

    let pr = store
        .pull_requests
        .get_mut(&req.pull_request_id)
        .ok_or(ApiError::NotFound)?;
    let mut reviewers = vec![replaced_by.clone()];
    reviewers.extend(
        pr.assigned_reviewers
            .iter()
            .filter(|id| **id != req.old_user_id)
            .cloned(),
    );
    pr.assigned_reviewers = reviewers;

    Ok(Json(ReassignResponse {
        pr: pr.clone(),
        replaced_by,
    }))
}

#[derive(Serialize)]
struct UserReviews {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

#[debug_handler]
async fn users_get_review(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<UserReviews> {
    state.enter(Route::UsersGetReview).await;
    let store = state.store();

    let pull_requests = store
        .pull_requests
        .values()
        .filter(|pr| pr.assigned_reviewers.contains(&query.user_id))
        .map(|pr| PullRequestShort {
            pull_request_id: pr.pull_request_id.clone(),
            pull_request_name: pr.pull_request_name.clone(),
            author_id: pr.author_id.clone(),
            status: pr.status,
        })
        .collect();

    Json(UserReviews {
        user_id: query.user_id,
        pull_requests,
    })
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[debug_handler]
async fn users_set_is_active(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetIsActive>,
) -> Result<Json<UserResponse>, ApiError> {
    state.enter(Route::UsersSetIsActive).await;
    let mut store = state.store();

    let user = store
        .users
        .get_mut(&req.user_id)
        .ok_or(ApiError::NotFound)?;
    user.is_active = req.is_active;

    let user = store.user(&req.user_id).ok_or(ApiError::NotFound)?;
    Ok(Json(UserResponse { user }))
}

fn now() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}
