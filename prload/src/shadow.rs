//! Client-side approximation of the server's teams, users and pull requests.
//!
//! The shadow state is shared by every scenario worker of a run. Lookups used
//! for random selection work on snapshots (users and team names live behind
//! [`ArcSwap`]s) or under short read locks, and every mutation of a pull
//! request happens under the table's write lock so no reader ever sees a
//! half-updated reviewer list.
//!
//! The shadow state is best effort: the service may rotate reviewers or
//! membership on its own, so callers must treat a missing or changed entity as
//! a skip rather than a fault.
use crate::error::SkipReason;
use arc_swap::ArcSwap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestStatus {
    Open,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub id: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    /// Assigned reviewers in server order, without duplicates.
    pub reviewers: Vec<String>,
}

impl PullRequest {
    pub fn open(id: &str, author_id: &str, reviewers: Vec<String>) -> Self {
        let mut unique = Vec::with_capacity(reviewers.len());
        for reviewer in reviewers {
            if !unique.contains(&reviewer) {
                unique.push(reviewer);
            }
        }

        Self {
            id: id.to_string(),
            author_id: author_id.to_string(),
            status: PullRequestStatus::Open,
            reviewers: unique,
        }
    }
}

/// A `(pull request, reviewer)` pair selected for reassignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignTarget {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    AlreadyMerged,
    UnknownPullRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassignOutcome {
    /// The old reviewer was replaced. If the replacement was already listed the
    /// old entry is simply removed.
    Applied,
    /// The old reviewer is no longer assigned; another swap won the race.
    StaleReviewer,
    UnknownPullRequest,
}

#[derive(Debug, Default)]
struct PullRequestTable {
    order: Vec<String>,
    by_id: HashMap<String, PullRequest>,
}

#[derive(Debug, Default)]
pub struct ShadowState {
    teams: RwLock<HashMap<String, Team>>,
    team_names: ArcSwap<Vec<String>>,
    user_team: RwLock<HashMap<String, String>>,
    users: ArcSwap<Vec<String>>,
    pull_requests: RwLock<PullRequestTable>,
}

impl ShadowState {
    pub fn new() -> Self {
        Self::default()
    }

    /* Teams and users */

    /// Record a team and its members. Returns `false` if the name is taken.
    pub fn insert_team(&self, team: Team) -> bool {
        let mut teams = write(&self.teams);
        if teams.contains_key(&team.name) {
            return false;
        }

        let mut new_users = Vec::with_capacity(team.members.len());
        {
            let mut user_team = write(&self.user_team);
            for member in &team.members {
                if user_team
                    .insert(member.user_id.clone(), team.name.clone())
                    .is_none()
                {
                    new_users.push(member.user_id.clone());
                }
            }
        }

        // Publish only after the back-references exist, so that any user id a
        // reader can select also resolves to a team.
        if !new_users.is_empty() {
            self.users.rcu(|users| {
                let mut users = Vec::clone(users);
                users.extend(new_users.iter().cloned());
                users
            });
        }

        let name = team.name.clone();
        teams.insert(name.clone(), team);
        self.team_names.rcu(|names| {
            let mut names = Vec::clone(names);
            names.push(name.clone());
            names
        });

        true
    }

    pub fn team(&self, name: &str) -> Option<Team> {
        read(&self.teams).get(name).cloned()
    }

    pub fn team_of(&self, user_id: &str) -> Option<String> {
        read(&self.user_team).get(user_id).cloned()
    }

    pub fn random_team_name<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.team_names.load().choose(rng).cloned()
    }

    pub fn random_user<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.users.load().choose(rng).cloned()
    }

    /// Mirror an activity flag change. Returns `false` for unknown users.
    pub fn set_member_active(&self, user_id: &str, is_active: bool) -> bool {
        let Some(team_name) = self.team_of(user_id) else {
            return false;
        };

        let mut teams = write(&self.teams);
        let member = teams
            .get_mut(&team_name)
            .and_then(|team| team.members.iter_mut().find(|m| m.user_id == user_id));

        match member {
            Some(member) => {
                member.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub fn team_count(&self) -> usize {
        self.team_names.load().len()
    }

    pub fn user_count(&self) -> usize {
        self.users.load().len()
    }

    /// Known user ids in insertion order.
    pub fn user_ids(&self) -> Vec<String> {
        Vec::clone(&self.users.load())
    }

    /* Pull requests */

    /// Record a newly created pull request. Returns `false` if the id is taken.
    pub fn insert_pull_request(&self, pull_request: PullRequest) -> bool {
        let mut table = write(&self.pull_requests);
        if table.by_id.contains_key(&pull_request.id) {
            return false;
        }

        table.order.push(pull_request.id.clone());
        table.by_id.insert(pull_request.id.clone(), pull_request);
        true
    }

    pub fn pull_request(&self, id: &str) -> Option<PullRequest> {
        read(&self.pull_requests).by_id.get(id).cloned()
    }

    pub fn random_pull_request<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PullRequest> {
        let table = read(&self.pull_requests);
        table
            .order
            .choose(rng)
            .and_then(|id| table.by_id.get(id))
            .cloned()
    }

    /// Pick a pull request uniformly, then one of its reviewers uniformly.
    pub fn pick_reassignment<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<ReassignTarget, SkipReason> {
        let table = read(&self.pull_requests);
        let pull_request = table
            .order
            .choose(rng)
            .and_then(|id| table.by_id.get(id))
            .ok_or(SkipReason::NoPullRequests)?;

        let reviewer = pull_request
            .reviewers
            .choose(rng)
            .ok_or(SkipReason::NoReviewers)?;

        Ok(ReassignTarget {
            pull_request_id: pull_request.id.clone(),
            old_reviewer_id: reviewer.clone(),
        })
    }

    /// Draw `count` pull requests with replacement and keep those that have
    /// reviewers, each paired with one of its reviewers. Order of the returned
    /// targets is the draw order.
    pub fn sample_reassignments<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Vec<ReassignTarget> {
        let table = read(&self.pull_requests);
        if table.order.is_empty() {
            return vec![];
        }

        (0..count)
            .filter_map(|_| {
                let pull_request = table
                    .order
                    .choose(rng)
                    .and_then(|id| table.by_id.get(id))?;
                let reviewer = pull_request.reviewers.choose(rng)?;
                Some(ReassignTarget {
                    pull_request_id: pull_request.id.clone(),
                    old_reviewer_id: reviewer.clone(),
                })
            })
            .collect()
    }

    /// `merged` is terminal; merging twice leaves the entry untouched.
    pub fn mark_merged(&self, id: &str) -> MergeOutcome {
        let mut table = write(&self.pull_requests);
        match table.by_id.get_mut(id) {
            None => MergeOutcome::UnknownPullRequest,
            Some(pr) if pr.status == PullRequestStatus::Merged => MergeOutcome::AlreadyMerged,
            Some(pr) => {
                pr.status = PullRequestStatus::Merged;
                MergeOutcome::Merged
            }
        }
    }

    /// Swap `target.old_reviewer_id` for `new_reviewer_id`.
    ///
    /// Check and swap happen under one write lock, so for concurrent calls
    /// naming the same `(pull request, old reviewer)` pair at most one applies.
    pub fn apply_reassignment(
        &self,
        target: &ReassignTarget,
        new_reviewer_id: &str,
    ) -> ReassignOutcome {
        let mut table = write(&self.pull_requests);
        let Some(pr) = table.by_id.get_mut(&target.pull_request_id) else {
            return ReassignOutcome::UnknownPullRequest;
        };

        let Some(idx) = pr
            .reviewers
            .iter()
            .position(|r| *r == target.old_reviewer_id)
        else {
            trace!(
                "Reviewer {} already replaced on {}",
                target.old_reviewer_id,
                pr.id
            );
            return ReassignOutcome::StaleReviewer;
        };

        if new_reviewer_id != target.old_reviewer_id
            && pr.reviewers.iter().any(|r| r == new_reviewer_id)
        {
            pr.reviewers.remove(idx);
        } else {
            pr.reviewers[idx] = new_reviewer_id.to_string();
        }

        ReassignOutcome::Applied
    }

    pub fn pull_request_count(&self) -> usize {
        read(&self.pull_requests).order.len()
    }
}

// A panic while holding a shadow lock cannot leave an entity half-written:
// every mutation is a single assignment or push, so the data is still usable.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
