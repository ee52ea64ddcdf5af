//! Identifier generation for teams, users and pull requests.
//!
//! Identifiers are derived from random v4 UUIDs, so any number of scenario
//! workers can draw from the same [`IdGenerator`] without coordination.
use uuid::Uuid;

/// Hex characters kept from a UUID for display names.
const SHORT_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct IdGenerator {
    run_tag: String,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            run_tag: short(8),
        }
    }

    /// Use a fixed run tag. Seeded identifiers become reproducible.
    pub fn with_run_tag(run_tag: &str) -> Self {
        Self {
            run_tag: run_tag.to_string(),
        }
    }

    pub fn run_tag(&self) -> &str {
        &self.run_tag
    }

    pub fn team_name(&self) -> String {
        format!("Team-{}", short(SHORT_LEN))
    }

    pub fn user_id(&self) -> String {
        format!("u-{}", Uuid::new_v4().simple())
    }

    pub fn username(&self) -> String {
        format!("User-{}", short(SHORT_LEN))
    }

    pub fn pull_request_id(&self) -> String {
        format!("pr-{}", Uuid::new_v4().simple())
    }

    pub fn pull_request_name(&self) -> String {
        format!("Feature-{}", short(SHORT_LEN))
    }

    /// Name of the `team`-th team created during setup.
    pub fn seed_team_name(&self, team: usize) -> String {
        format!("Team{team}-{}", self.run_tag)
    }

    /// Id of the `member`-th user of the `team`-th team created during setup.
    pub fn seed_user_id(&self, team: usize, member: usize) -> String {
        format!("u{team}_{member}-{}", self.run_tag)
    }

    pub fn seed_username(&self, team: usize, member: usize) -> String {
        format!("User{team}_{member}")
    }

    /// Id of the pull request authored by the `idx`-th seeded user.
    pub fn seed_pull_request_id(&self, idx: usize) -> String {
        format!("pr-{idx}-{}", self.run_tag)
    }

    pub fn seed_pull_request_name(&self, idx: usize) -> String {
        format!("Feature{idx}")
    }
}

fn short(len: usize) -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(len);
    id
}
