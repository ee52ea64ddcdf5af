//! Seeding of the service and the shadow state before traffic starts.
use crate::api;
use crate::operations::{team_from_api, Workload};
use crate::shadow::PullRequest;
use prload_core::{SeedConfig, SetupReport};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Create `seed.teams` teams of `seed.members_per_team` members, then one pull
/// request authored by each seeded user.
///
/// Requests run sequentially. Only entities the service acknowledged are
/// recorded in the shadow state; failures are logged and counted.
#[instrument(name = "setup", skip_all, fields(teams = seed.teams, members = seed.members_per_team))]
pub async fn seed(wl: &Workload, seed: &SeedConfig) -> SetupReport {
    let mut report = SetupReport::default();
    let ids = wl.ids();
    let mut authors = Vec::with_capacity(seed.teams * seed.members_per_team);

    for team_idx in 0..seed.teams {
        let team = api::TeamAddRequest {
            team_name: ids.seed_team_name(team_idx),
            members: (0..seed.members_per_team)
                .map(|member| api::TeamMember {
                    user_id: ids.seed_user_id(team_idx, member),
                    username: ids.seed_username(team_idx, member),
                    is_active: true,
                })
                .collect(),
        };

        match wl.client().add_team(&team).await {
            Ok(_) => {
                authors.extend(team.members.iter().map(|m| m.user_id.clone()));
                wl.shadow().insert_team(team_from_api(team));
                report.teams_created += 1;
            }
            Err(err) => {
                error!("Unable to create team {}: {err}", team.team_name);
                report.teams_failed += 1;
            }
        }
    }

    for (idx, author_id) in authors.into_iter().enumerate() {
        let request = api::CreatePullRequest {
            pull_request_id: ids.seed_pull_request_id(idx),
            pull_request_name: ids.seed_pull_request_name(idx),
            author_id,
        };

        match wl.client().create_pull_request(&request).await {
            Ok(res) => {
                wl.shadow().insert_pull_request(PullRequest::open(
                    &request.pull_request_id,
                    &request.author_id,
                    res.pr.into_assigned_reviewers(),
                ));
                report.pull_requests_created += 1;
            }
            Err(err) => {
                error!(
                    "Unable to create pull request {}: {err}",
                    request.pull_request_id
                );
                report.pull_requests_failed += 1;
            }
        }
    }

    info!("Setup complete: {report}");
    report
}
