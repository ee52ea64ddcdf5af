//! Batch reviewer reassignment.
//!
//! One invocation samples several pull requests, sends every reassignment as
//! one concurrent batch and reconciles all answers in a single pass. Requests
//! and responses are kept as a pair of sequences built and consumed in
//! lock-step: the i-th response answers the i-th target.
use crate::api::{ReassignResponse, ReassignReviewer};
use crate::error::OperationError;
use crate::operations::{log_failure, OperationReport, Workload};
use crate::shadow::{ReassignOutcome, ReassignTarget, ShadowState};
use futures_util::future::join_all;
use rand::Rng;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Pull requests drawn from the shadow state.
    pub sampled: usize,
    /// Draws that had a reviewer and produced a request.
    pub sent: usize,
    pub applied: usize,
    /// Successful answers whose old reviewer was already swapped out locally.
    pub stale: usize,
    pub failed: usize,
}

impl From<BatchReport> for OperationReport {
    fn from(report: BatchReport) -> Self {
        OperationReport {
            applied: report.applied as u64,
            skipped: (report.stale + report.sampled - report.sent) as u64,
            failed: report.failed as u64,
        }
    }
}

/// Sample `batch_size` pull requests with replacement and reassign one reviewer
/// of each in a single batch.
#[instrument(name = "batch", skip_all, fields(size = batch_size))]
pub async fn reassign_batch<R: Rng + Send>(
    wl: &Workload,
    rng: &mut R,
    batch_size: usize,
) -> BatchReport {
    let targets = wl.shadow().sample_reassignments(rng, batch_size);
    if targets.is_empty() {
        trace!("No reassignable pull requests");
        return BatchReport {
            sampled: batch_size,
            ..Default::default()
        };
    }

    let requests: Vec<ReassignReviewer> = targets
        .iter()
        .map(|target| ReassignReviewer {
            pull_request_id: target.pull_request_id.clone(),
            old_user_id: target.old_reviewer_id.clone(),
        })
        .collect();

    // `join_all` yields outputs in the order of its inputs regardless of
    // completion order.
    let client = wl.client();
    let responses = join_all(requests.iter().map(|req| client.reassign_reviewer(req))).await;

    let mut report = reconcile(wl.shadow(), &targets, responses);
    report.sampled = batch_size;
    debug!(
        "Batch done: sent={} applied={} stale={} failed={}",
        report.sent, report.applied, report.stale, report.failed
    );
    report
}

/// Apply the answers of a batch to the shadow state, pairing `responses[i]`
/// with `targets[i]`.
pub fn reconcile(
    shadow: &ShadowState,
    targets: &[ReassignTarget],
    responses: Vec<Result<ReassignResponse, OperationError>>,
) -> BatchReport {
    let mut report = BatchReport {
        sampled: targets.len(),
        sent: targets.len(),
        ..Default::default()
    };

    if responses.len() != targets.len() {
        error!(
            "Batch answered {} of {} requests; discarding the batch",
            responses.len(),
            targets.len()
        );
        report.failed = targets.len();
        return report;
    }

    for (target, res) in targets.iter().zip(responses) {
        let res = match res {
            Ok(res) => res,
            Err(err) => {
                log_failure(&err);
                report.failed += 1;
                continue;
            }
        };

        // The body echoes the pull request when the service includes it; a
        // different id means the answer belongs to another request.
        if let Some(pr) = &res.pr {
            if pr.pull_request_id != target.pull_request_id {
                error!(
                    "Reassign answer for {} paired with request for {}",
                    pr.pull_request_id, target.pull_request_id
                );
                report.failed += 1;
                continue;
            }
        }

        match shadow.apply_reassignment(target, &res.replaced_by) {
            ReassignOutcome::Applied => report.applied += 1,
            ReassignOutcome::StaleReviewer => report.stale += 1,
            ReassignOutcome::UnknownPullRequest => report.stale += 1,
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Endpoint;
    use crate::shadow::PullRequest;
    use reqwest::StatusCode;

    fn target(pr: &str, old: &str) -> ReassignTarget {
        ReassignTarget {
            pull_request_id: pr.to_string(),
            old_reviewer_id: old.to_string(),
        }
    }

    fn answer(replaced_by: &str) -> Result<ReassignResponse, OperationError> {
        Ok(ReassignResponse {
            pr: None,
            replaced_by: replaced_by.to_string(),
        })
    }

    fn shadow() -> ShadowState {
        let shadow = ShadowState::new();
        for i in 0..4 {
            shadow.insert_pull_request(PullRequest::open(
                &format!("pr{i}"),
                "author",
                vec![format!("old{i}"), format!("keep{i}")],
            ));
        }
        shadow
    }

    #[test]
    fn responses_pair_positionally() {
        let shadow = shadow();
        let targets: Vec<_> = (0..4)
            .map(|i| target(&format!("pr{i}"), &format!("old{i}")))
            .collect();
        let responses = (0..4).map(|i| answer(&format!("new{i}"))).collect();

        let report = reconcile(&shadow, &targets, responses);
        assert_eq!(report.applied, 4);
        for i in 0..4 {
            let pr = shadow.pull_request(&format!("pr{i}")).unwrap();
            assert_eq!(pr.reviewers, vec![format!("new{i}"), format!("keep{i}")]);
        }
    }

    #[test]
    fn failed_entries_leave_their_pull_request_alone() {
        let shadow = shadow();
        let targets = vec![target("pr0", "old0"), target("pr1", "old1")];
        let responses = vec![
            Err(OperationError::UnexpectedStatus {
                endpoint: Endpoint::PullRequestReassign,
                status: StatusCode::CONFLICT,
                code: Some("NO_CANDIDATE".to_string()),
            }),
            answer("new1"),
        ];

        let report = reconcile(&shadow, &targets, responses);
        assert_eq!((report.applied, report.failed), (1, 1));
        assert_eq!(
            shadow.pull_request("pr0").unwrap().reviewers,
            vec!["old0", "keep0"]
        );
        assert_eq!(
            shadow.pull_request("pr1").unwrap().reviewers,
            vec!["new1", "keep1"]
        );
    }

    #[test]
    fn duplicate_draws_swap_once() {
        let shadow = shadow();
        let targets = vec![target("pr2", "old2"), target("pr2", "old2")];
        let responses = vec![answer("new2"), answer("other2")];

        let report = reconcile(&shadow, &targets, responses);
        assert_eq!((report.applied, report.stale), (1, 1));
        assert_eq!(
            shadow.pull_request("pr2").unwrap().reviewers,
            vec!["new2", "keep2"]
        );
    }

    #[test]
    fn length_mismatch_discards_batch() {
        let shadow = shadow();
        let targets = vec![target("pr0", "old0"), target("pr1", "old1")];
        let report = reconcile(&shadow, &targets, vec![answer("new0")]);
        assert_eq!(report.failed, 2);
        assert_eq!(
            shadow.pull_request("pr0").unwrap().reviewers,
            vec!["old0", "keep0"]
        );
    }

    #[test]
    fn report_conversion_counts_unsent_draws_as_skips() {
        let report = BatchReport {
            sampled: 10,
            sent: 7,
            applied: 5,
            stale: 1,
            failed: 1,
        };
        assert_eq!(
            OperationReport::from(report),
            OperationReport {
                applied: 5,
                skipped: 4,
                failed: 1
            }
        );
    }
}
