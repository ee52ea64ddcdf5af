mod utils;
use utils::*;

use mock_service::{MockConfig, Route};
use prload::prelude::*;
use rand::rngs::SmallRng;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleeps for a fixed time per invocation.
#[derive(Clone, Default)]
struct Sleepy {
    delay: Duration,
    calls: Arc<AtomicU64>,
}

impl Operation for Sleepy {
    async fn invoke(&self, _rng: &mut SmallRng) -> OperationReport {
        tokio::time::sleep(self.delay).await;
        self.calls.fetch_add(1, Ordering::Relaxed);
        OperationReport {
            applied: 1,
            ..Default::default()
        }
    }
}

fn scenario(name: &str, rate: u32, duration: Duration) -> ScenarioConfig {
    let mut config = ScenarioConfig::new(name, OperationKind::QueryTeam);
    config.rate = NonZeroU32::new(rate).unwrap();
    config.duration = duration;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(15_000)]
async fn slow_scenario_does_not_slow_its_neighbour() {
    init();

    let fast_config = scenario("fast", 50, Duration::from_secs(2));
    let slow_config = scenario("slow", 20, Duration::from_secs(2));
    let fast = Scenario::with_config(
        fast_config.clone(),
        Sleepy {
            delay: Duration::from_millis(5),
            ..Default::default()
        },
    );
    let slow = Scenario::with_config(
        slow_config.clone(),
        Sleepy {
            delay: Duration::from_secs(1),
            ..Default::default()
        },
    )
    .workers(2)
    .queue_capacity(2);

    let (fast, slow) = tokio::join!(fast, slow);

    assert!(
        dispatch_window(&fast_config).contains(&fast.scheduled),
        "fast scheduled {}",
        fast.scheduled
    );
    assert_eq!(fast.dropped, 0);
    assert_eq!(fast.completed, fast.scheduled);

    // The slow scenario keeps its own clock and sheds what it cannot start.
    assert!(
        dispatch_window(&slow_config).contains(&slow.scheduled),
        "slow scheduled {}",
        slow.scheduled
    );
    assert!(slow.dropped > 0);
    assert_eq!(slow.completed + slow.dropped, slow.scheduled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn mixed_profile_runs_end_to_end() {
    init();
    let (addr, state) = mock_service::spawn(MockConfig::default()).await.unwrap();

    let mut config = RunConfig::from_profile(Profile::Mixed);
    config.base_url = format!("http://{addr}");
    config.seed = SeedConfig {
        teams: 3,
        members_per_team: 4,
    };
    for scenario in config.scenarios.iter_mut() {
        scenario.rate = NonZeroU32::new(20).unwrap();
        scenario.duration = Duration::from_secs(1);
        scenario.pre_allocated_workers = 4;
    }

    let stats = prload::run(config.clone()).await.unwrap();

    assert_eq!(stats.setup.teams_created, 3);
    assert_eq!(stats.setup.pull_requests_created, 12);
    assert_eq!(stats.scenarios.len(), 6);
    for (scenario, configured) in stats.scenarios.iter().zip(&config.scenarios) {
        assert_eq!(scenario.name, configured.name);
        assert_eq!(scenario.phase, ScenarioPhase::Stopped);
        assert!(
            dispatch_window(configured).contains(&scenario.scheduled),
            "{scenario}"
        );
        assert_eq!(scenario.completed + scenario.dropped, scenario.scheduled);
    }

    for name in ["add_team", "create_pr", "get_team_info", "get_user_prs"] {
        let scenario = stats.scenario(name).unwrap();
        assert_eq!(scenario.failed, 0, "{scenario}");
        assert!(scenario.applied > 0, "{scenario}");
        assert!(scenario.requests_ok > 0, "{scenario}");
    }

    assert!(state.requests(Route::TeamAdd) >= 3);
    assert!(state.requests(Route::TeamGet) > 0);
    assert!(state.requests(Route::UsersGetReview) > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn batch_profile_keeps_shadow_consistent() {
    let (wl, state) = mock_workload(MockConfig {
        reviewers_per_pr: 1,
        random_choice: true,
        max_jitter: Duration::from_millis(5),
    })
    .await
    .unwrap();

    let mut config = RunConfig::from_profile(Profile::ReassignBatch);
    config.seed = SeedConfig {
        teams: 2,
        members_per_team: 5,
    };
    config.scenarios[0].rate = NonZeroU32::new(20).unwrap();
    config.scenarios[0].duration = Duration::from_secs(1);
    config.scenarios[0].batch_size = 5;

    let stats = prload::run_with_workload(config, wl.clone()).await.unwrap();
    let batch = stats.scenario("reassign_reviewer").unwrap();

    assert_eq!(batch.operation, OperationKind::BatchReassign);
    assert!(batch.applied > 0, "{batch}");
    // One outcome per drawn pull request.
    assert_eq!(
        batch.applied + batch.skipped + batch.failed,
        batch.completed * 5
    );
    assert_eq!(
        state.requests(Route::PullRequestReassign),
        batch.requests()
    );
    assert_reviewers_match(&wl, &state);
}
