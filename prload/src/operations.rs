//! One function per logical operation of the workload.
//!
//! Each operation reads the shadow state, builds a request, validates the
//! response and updates the shadow state. Missing preconditions short-circuit
//! before any request is sent.
use crate::api::{self, ApiClient};
use crate::batch;
use crate::error::{OperationError, SkipReason};
use crate::ids::IdGenerator;
use crate::shadow::{Member, MergeOutcome, PullRequest, ReassignOutcome, ShadowState, Team};
use prload_core::{OperationKind, DYNAMIC_TEAM_SIZE};
use rand::rngs::SmallRng;
use rand::Rng;
use std::ops::AddAssign;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Everything an operation needs: the service, the shadow state and a source
/// of fresh identifiers. One `Workload` is shared by every scenario of a run.
#[derive(Debug)]
pub struct Workload {
    client: ApiClient,
    shadow: ShadowState,
    ids: IdGenerator,
}

impl Workload {
    pub fn new(client: ApiClient) -> Self {
        Self::with_parts(client, ShadowState::new(), IdGenerator::new())
    }

    pub fn with_parts(client: ApiClient, shadow: ShadowState, ids: IdGenerator) -> Self {
        Self {
            client,
            shadow,
            ids,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn shadow(&self) -> &ShadowState {
        &self.shadow
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }
}

/// Result of an operation that got a valid answer, or did not need to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
}

/// Logical outcome counts of one scheduled invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationReport {
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl OperationReport {
    pub fn total(&self) -> u64 {
        self.applied + self.skipped + self.failed
    }
}

impl AddAssign for OperationReport {
    fn add_assign(&mut self, rhs: Self) {
        self.applied += rhs.applied;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

impl From<&Result<Outcome, OperationError>> for OperationReport {
    fn from(res: &Result<Outcome, OperationError>) -> Self {
        let mut report = OperationReport::default();
        match res {
            Ok(Outcome::Applied) => report.applied = 1,
            Ok(Outcome::Skipped(_)) => report.skipped = 1,
            Err(_) => report.failed = 1,
        }
        report
    }
}

/// Log a failed operation at a level matching its error class.
pub(crate) fn log_failure(err: &OperationError) {
    match err {
        OperationError::UnexpectedStatus { .. } => debug!("{err}"),
        OperationError::Transport { .. } | OperationError::MalformedResponse { .. } => {
            warn!("{err}")
        }
    }
}

/// Work bound to a scenario, invoked once per tick.
///
/// Each worker owns the `SmallRng` it passes in, so invocations never contend
/// on a shared generator.
#[trait_variant::make(Operation: Send)]
pub trait LocalOperation {
    async fn invoke(&self, rng: &mut SmallRng) -> OperationReport;
}

/// An [`OperationKind`] bound to a shared [`Workload`].
#[derive(Debug, Clone)]
pub struct BoundOperation {
    kind: OperationKind,
    workload: Arc<Workload>,
    batch_size: usize,
}

impl BoundOperation {
    pub fn new(kind: OperationKind, workload: Arc<Workload>) -> Self {
        Self {
            kind,
            workload,
            batch_size: prload_core::DEFAULT_BATCH_SIZE,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Run one single-entity operation. A batch binding runs a single
    /// reassignment.
    pub async fn run_once(&self, rng: &mut SmallRng) -> Result<Outcome, OperationError> {
        let wl = self.workload.as_ref();
        match self.kind {
            OperationKind::CreateTeam => create_team(wl, rng).await,
            OperationKind::CreatePullRequest => create_pull_request(wl, rng).await,
            OperationKind::MergePullRequest => merge_pull_request(wl, rng).await,
            OperationKind::ReassignReviewer | OperationKind::BatchReassign => {
                reassign_reviewer(wl, rng).await
            }
            OperationKind::QueryTeam => query_team(wl, rng).await,
            OperationKind::QueryUserReviews => query_user_reviews(wl, rng).await,
            OperationKind::SetUserActive => set_user_active(wl, rng).await,
        }
    }
}

impl Operation for BoundOperation {
    async fn invoke(&self, rng: &mut SmallRng) -> OperationReport {
        if self.kind == OperationKind::BatchReassign {
            return batch::reassign_batch(&self.workload, rng, self.batch_size)
                .await
                .into();
        }

        let res = self.run_once(rng).await;
        if let Err(err) = &res {
            log_failure(err);
        }
        OperationReport::from(&res)
    }
}

/* Operations */

/// Create a team of fresh members.
pub async fn create_team<R: Rng + Send>(
    wl: &Workload,
    _rng: &mut R,
) -> Result<Outcome, OperationError> {
    let ids = wl.ids();
    let request = api::TeamAddRequest {
        team_name: ids.team_name(),
        members: (0..DYNAMIC_TEAM_SIZE)
            .map(|_| api::TeamMember {
                user_id: ids.user_id(),
                username: ids.username(),
                is_active: true,
            })
            .collect(),
    };

    wl.client().add_team(&request).await?;
    wl.shadow().insert_team(team_from_api(request));
    Ok(Outcome::Applied)
}

/// Open a pull request authored by a random known user.
pub async fn create_pull_request<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
) -> Result<Outcome, OperationError> {
    let Some(author_id) = wl.shadow().random_user(rng) else {
        return Ok(Outcome::Skipped(SkipReason::NoUsers));
    };

    let request = api::CreatePullRequest {
        pull_request_id: wl.ids().pull_request_id(),
        pull_request_name: wl.ids().pull_request_name(),
        author_id,
    };
    let res = wl.client().create_pull_request(&request).await?;

    wl.shadow().insert_pull_request(PullRequest::open(
        &request.pull_request_id,
        &request.author_id,
        res.pr.into_assigned_reviewers(),
    ));
    Ok(Outcome::Applied)
}

/// Merge a random known pull request.
pub async fn merge_pull_request<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
) -> Result<Outcome, OperationError> {
    let Some(pull_request) = wl.shadow().random_pull_request(rng) else {
        return Ok(Outcome::Skipped(SkipReason::NoPullRequests));
    };

    let request = api::MergePullRequest {
        pull_request_id: pull_request.id,
    };
    wl.client().merge_pull_request(&request).await?;

    Ok(match wl.shadow().mark_merged(&request.pull_request_id) {
        MergeOutcome::Merged => Outcome::Applied,
        MergeOutcome::AlreadyMerged => Outcome::Skipped(SkipReason::AlreadyMerged),
        MergeOutcome::UnknownPullRequest => Outcome::Skipped(SkipReason::UnknownPullRequest),
    })
}

/// Replace one reviewer of a random known pull request.
pub async fn reassign_reviewer<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
) -> Result<Outcome, OperationError> {
    let target = match wl.shadow().pick_reassignment(rng) {
        Ok(target) => target,
        Err(reason) => return Ok(Outcome::Skipped(reason)),
    };

    let request = api::ReassignReviewer {
        pull_request_id: target.pull_request_id.clone(),
        old_user_id: target.old_reviewer_id.clone(),
    };
    let res = wl.client().reassign_reviewer(&request).await?;

    Ok(
        match wl.shadow().apply_reassignment(&target, &res.replaced_by) {
            ReassignOutcome::Applied => Outcome::Applied,
            ReassignOutcome::StaleReviewer => Outcome::Skipped(SkipReason::StaleReviewer),
            ReassignOutcome::UnknownPullRequest => {
                Outcome::Skipped(SkipReason::UnknownPullRequest)
            }
        },
    )
}

pub async fn query_team<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
) -> Result<Outcome, OperationError> {
    let Some(team_name) = wl.shadow().random_team_name(rng) else {
        return Ok(Outcome::Skipped(SkipReason::NoTeams));
    };

    wl.client().get_team(&team_name).await?;
    Ok(Outcome::Applied)
}

pub async fn query_user_reviews<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
) -> Result<Outcome, OperationError> {
    let Some(user_id) = wl.shadow().random_user(rng) else {
        return Ok(Outcome::Skipped(SkipReason::NoUsers));
    };

    wl.client().get_review(&user_id).await?;
    Ok(Outcome::Applied)
}

/// Flip a random user's activity flag with probability one half.
pub async fn set_user_active<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
) -> Result<Outcome, OperationError> {
    let Some(user_id) = wl.shadow().random_user(rng) else {
        return Ok(Outcome::Skipped(SkipReason::NoUsers));
    };

    let request = api::SetIsActive {
        user_id,
        is_active: rng.gen_bool(0.5),
    };
    wl.client().set_is_active(&request).await?;

    wl.shadow()
        .set_member_active(&request.user_id, request.is_active);
    Ok(Outcome::Applied)
}

pub(crate) fn team_from_api(team: api::Team) -> Team {
    Team {
        name: team.team_name,
        members: team
            .members
            .into_iter()
            .map(|m| Member {
                user_id: m.user_id,
                username: m.username,
                is_active: m.is_active,
            })
            .collect(),
    }
}
