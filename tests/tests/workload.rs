mod utils;
use utils::*;

use mock_service::{MockConfig, Route};
use prload::api::MergePullRequest;
use prload::batch::reassign_batch;
use prload::error::SkipReason;
use prload::ids::IdGenerator;
use prload::operations::{self, Outcome, Workload};
use prload::setup;
use prload::shadow::{PullRequestStatus, ReassignTarget, ShadowState};
use prload_core::SeedConfig;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing_test::traced_test;

fn seed(teams: usize, members_per_team: usize) -> SeedConfig {
    SeedConfig {
        teams,
        members_per_team,
    }
}

#[traced_test]
#[tokio::test]
#[ntest::timeout(10_000)]
async fn seeding_records_acknowledged_entities() {
    let (wl, state) = mock_workload(ordered(2)).await.unwrap();

    let report = setup::seed(&wl, &seed(2, 3)).await;
    assert_eq!(report.teams_created, 2);
    assert_eq!(report.pull_requests_created, 6);
    assert_eq!(report.teams_failed + report.pull_requests_failed, 0);
    assert_eq!(wl.shadow().team_count(), 2);
    assert_eq!(wl.shadow().user_count(), 6);
    assert_eq!(state.requests(Route::TeamAdd), 2);
    assert_reviewers_match(&wl, &state);

    // A second seeding with the same run tag collides on every team.
    let report = setup::seed(&wl, &seed(2, 3)).await;
    assert_eq!(report.teams_created, 0);
    assert_eq!(report.teams_failed, 2);
    assert_eq!(wl.shadow().team_count(), 2);
    assert!(logs_contain("Unable to create team"));
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn reassignment_replaces_reviewer_in_place() {
    // Three members and one reviewer per pull request leave exactly one
    // candidate for every reassignment.
    let (wl, state) = mock_workload(ordered(1)).await.unwrap();
    setup::seed(&wl, &seed(1, 3)).await;

    let ids = wl.ids();
    let first = ids.seed_pull_request_id(0);
    let author = ids.seed_user_id(0, 0);
    assert_eq!(
        wl.shadow().pull_request(&first).unwrap().reviewers,
        vec![ids.seed_user_id(0, 1)]
    );

    // A shadow that only knows the first pull request pins the target.
    let pinned = Workload::with_parts(
        wl.client().clone(),
        ShadowState::new(),
        IdGenerator::with_run_tag(ids.run_tag()),
    );
    pinned
        .shadow()
        .insert_pull_request(wl.shadow().pull_request(&first).unwrap());
    let mut rng = SmallRng::seed_from_u64(7);
    assert_eq!(
        operations::reassign_reviewer(&pinned, &mut rng).await.unwrap(),
        Outcome::Applied
    );
    let replaced_by = ids.seed_user_id(0, 2);
    assert_eq!(
        pinned.shadow().pull_request(&first).unwrap().reviewers,
        vec![replaced_by.clone()]
    );
    assert_eq!(
        state.pull_request(&first).unwrap().assigned_reviewers,
        vec![replaced_by.clone()]
    );
    // Bring the run's shadow in line before drawing at random.
    wl.shadow().apply_reassignment(
        &ReassignTarget {
            pull_request_id: first.clone(),
            old_reviewer_id: ids.seed_user_id(0, 1),
        },
        &replaced_by,
    );
    assert_reviewers_match(&wl, &state);

    for _ in 0..6 {
        let before: Vec<_> = (0..3)
            .map(|i| wl.shadow().pull_request(&ids.seed_pull_request_id(i)).unwrap())
            .collect();

        let outcome = operations::reassign_reviewer(&wl, &mut rng).await.unwrap();
        assert_eq!(outcome, Outcome::Applied);
        assert_reviewers_match(&wl, &state);

        let changed: Vec<_> = before
            .iter()
            .filter(|pr| wl.shadow().pull_request(&pr.id).unwrap() != **pr)
            .collect();
        assert_eq!(changed.len(), 1);
        let after = wl.shadow().pull_request(&changed[0].id).unwrap();
        assert_eq!(after.reviewers.len(), 1);
        assert_ne!(after.reviewers, changed[0].reviewers);
        assert_ne!(after.reviewers[0], after.author_id);
    }

    assert_eq!(wl.shadow().pull_request(&first).unwrap().author_id, author);
    assert_eq!(state.requests(Route::PullRequestReassign), 7);
}

#[traced_test]
#[tokio::test]
#[ntest::timeout(10_000)]
async fn missing_preconditions_send_nothing() {
    let (wl, state) = mock_workload(ordered(0)).await.unwrap();
    let mut rng = SmallRng::seed_from_u64(3);

    assert_eq!(
        operations::reassign_reviewer(&wl, &mut rng).await.unwrap(),
        Outcome::Skipped(SkipReason::NoPullRequests)
    );
    let report = reassign_batch(&wl, &mut rng, 10).await;
    assert_eq!(report.sent, 0);

    // Pull requests exist but nobody reviews them.
    setup::seed(&wl, &seed(1, 3)).await;
    assert_eq!(wl.shadow().pull_request_count(), 3);
    assert_eq!(
        operations::reassign_reviewer(&wl, &mut rng).await.unwrap(),
        Outcome::Skipped(SkipReason::NoReviewers)
    );
    assert_eq!(reassign_batch(&wl, &mut rng, 10).await.sent, 0);

    assert_eq!(state.requests(Route::PullRequestReassign), 0);
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn merge_is_idempotent() {
    let (wl, state) = mock_workload(MockConfig::default()).await.unwrap();
    setup::seed(&wl, &seed(1, 3)).await;

    let request = MergePullRequest {
        pull_request_id: wl.ids().seed_pull_request_id(0),
    };
    for _ in 0..2 {
        let res = wl.client().merge_pull_request(&request).await.unwrap();
        assert_eq!(res.pr.status, prload::api::PullRequestStatus::Merged);
    }

    let mut rng = SmallRng::seed_from_u64(11);
    let mut applied = 0;
    for _ in 0..12 {
        match operations::merge_pull_request(&wl, &mut rng).await.unwrap() {
            Outcome::Applied => applied += 1,
            Outcome::Skipped(reason) => assert_eq!(reason, SkipReason::AlreadyMerged),
        }
    }
    assert!(applied <= 3);

    for id in (0..3).map(|i| wl.ids().seed_pull_request_id(i)) {
        let local = wl.shadow().pull_request(&id).unwrap();
        if local.status == PullRequestStatus::Merged {
            assert_eq!(
                state.pull_request(&id).unwrap().status,
                mock_service::Status::Merged
            );
        }
    }
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn activity_changes_are_mirrored() {
    let (wl, state) = mock_workload(MockConfig::default()).await.unwrap();
    setup::seed(&wl, &seed(2, 4)).await;

    let mut rng = SmallRng::seed_from_u64(5);
    for _ in 0..20 {
        assert_eq!(
            operations::set_user_active(&wl, &mut rng).await.unwrap(),
            Outcome::Applied
        );
    }

    for user_id in wl.shadow().user_ids() {
        let team = wl.shadow().team_of(&user_id).unwrap();
        let member = wl
            .shadow()
            .team(&team)
            .unwrap()
            .members
            .into_iter()
            .find(|m| m.user_id == user_id)
            .unwrap();
        assert_eq!(member.is_active, state.user(&user_id).unwrap().is_active);
    }
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn dynamic_entities_are_usable() {
    let (wl, state) = mock_workload(MockConfig::default()).await.unwrap();
    let mut rng = SmallRng::seed_from_u64(9);

    assert_eq!(
        operations::create_team(&wl, &mut rng).await.unwrap(),
        Outcome::Applied
    );
    assert_eq!(
        operations::create_pull_request(&wl, &mut rng).await.unwrap(),
        Outcome::Applied
    );
    assert_eq!(
        operations::query_team(&wl, &mut rng).await.unwrap(),
        Outcome::Applied
    );
    assert_eq!(
        operations::query_user_reviews(&wl, &mut rng).await.unwrap(),
        Outcome::Applied
    );

    assert_eq!(wl.shadow().team_count(), 1);
    assert_eq!(wl.shadow().user_count(), 2);
    assert_reviewers_match(&wl, &state);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn batches_stay_consistent_under_jitter() {
    let (wl, state) = mock_workload(MockConfig {
        reviewers_per_pr: 1,
        random_choice: true,
        max_jitter: Duration::from_millis(20),
    })
    .await
    .unwrap();
    setup::seed(&wl, &seed(3, 6)).await;

    let mut rng = SmallRng::seed_from_u64(21);
    let mut applied = 0;
    for _ in 0..10 {
        let report = reassign_batch(&wl, &mut rng, 10).await;
        assert_eq!(report.sent, 10);
        assert_eq!(report.applied + report.stale + report.failed, report.sent);
        applied += report.applied;
        assert_reviewers_match(&wl, &state);
    }

    assert!(applied > 0);
    assert_eq!(state.requests(Route::PullRequestReassign), 100);
}
