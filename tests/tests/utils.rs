use mock_service::{AppState, MockConfig};
use prload::api::ApiClient;
use prload::ids::IdGenerator;
use prload::operations::Workload;
use prload::shadow::ShadowState;
use prload_core::ScenarioConfig;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock};
use tracing::error;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        // `#[traced_test]` installs its own global subscriber and panics if
        // one is already set, so share its initialization instead of
        // installing a separate fmt subscriber.
        tracing_test::internal::INITIALIZED.call_once(|| {
            let mock_writer =
                tracing_test::internal::MockWriter::new(tracing_test::internal::global_buf());
            let subscriber = tracing_test::internal::get_subscriber(mock_writer, "trace");
            let _ = tracing::dispatcher::set_global_default(subscriber);
        });
    });
}

/// A mock service on an ephemeral port plus a workload pointed at it.
#[allow(unused)]
pub async fn mock_workload(
    config: MockConfig,
) -> anyhow::Result<(Arc<Workload>, Arc<AppState>)> {
    init();
    let (addr, state) = mock_service::spawn(config).await?;
    let client = ApiClient::new(&format!("http://{addr}"))?;
    let wl = Workload::with_parts(client, ShadowState::new(), IdGenerator::new());
    Ok((Arc::new(wl), state))
}

#[allow(unused)]
pub fn ordered(reviewers_per_pr: usize) -> MockConfig {
    MockConfig {
        reviewers_per_pr,
        random_choice: false,
        ..Default::default()
    }
}

/// Assert that every pull request the shadow knows has the reviewers the
/// service reports, ignoring order.
#[allow(unused)]
pub fn assert_reviewers_match(wl: &Workload, state: &AppState) {
    let mut checked = 0;
    for server in state.pull_requests() {
        let Some(local) = wl.shadow().pull_request(&server.pull_request_id) else {
            continue;
        };
        let local_set: BTreeSet<_> = local.reviewers.iter().collect();
        let server_set: BTreeSet<_> = server.assigned_reviewers.iter().collect();
        assert_eq!(
            local_set, server_set,
            "reviewers diverged for {}",
            server.pull_request_id
        );
        assert_eq!(local.reviewers.len(), server.assigned_reviewers.len());
        checked += 1;
    }
    assert_eq!(checked, wl.shadow().pull_request_count());
}

/// Tick counts a scenario may dispatch: scheduling slack below, the
/// limiter's initial burst above.
#[allow(unused)]
pub fn dispatch_window(config: &ScenarioConfig) -> RangeInclusive<u64> {
    let expected = config.expected_invocations().round() as u64;
    expected.saturating_sub(5)..=expected + 3
}
