//! `repository-maintainers`: creates a maintainers team for every new
//! repository and grants the configured teams access to it.

use serde::Deserialize;
use tracing::info;

use crate::github::GitHubClient;
use crate::github::models::{NewTeam, TeamPermission};
use crate::webhooks::{RepositoryAction, RepositoryEvent};

use super::{ActionError, WebhookHandler};

fn default_suffix() -> String {
    "-maintainers".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MaintainersArgs {
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default)]
    pub additional_memberships: Vec<Membership>,
}

/// An existing team that gets access to every new repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Membership {
    pub team_name: String,
    pub permission: TeamPermission,
}

/// A repository was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCreated {
    pub repo: String,
    pub creator: String,
}

pub(crate) fn repository_created(event: &RepositoryEvent) -> Result<RepositoryCreated, ActionError> {
    if event.action != RepositoryAction::Created {
        return Err(ActionError::skip(format!("repository action {}", event.action)));
    }
    Ok(RepositoryCreated {
        repo: event.repo.repo.clone(),
        creator: event.sender.clone(),
    })
}

#[derive(Debug)]
pub struct RepositoryMaintainers {
    client: GitHubClient,
    args: MaintainersArgs,
}

impl RepositoryMaintainers {
    pub fn new(client: GitHubClient, args: MaintainersArgs) -> Self {
        RepositoryMaintainers { client, args }
    }
}

impl WebhookHandler<RepositoryCreated> for RepositoryMaintainers {
    async fn handle(&self, params: RepositoryCreated) -> Result<(), ActionError> {
        let org = self.client.organization();
        let name = format!("{}{}", params.repo, self.args.suffix);

        let team = NewTeam {
            name: name.clone(),
            maintainers: vec![params.creator.clone()],
            repo_names: vec![format!("{}/{}", org, params.repo)],
            privacy: "closed".to_string(),
        };
        match self.client.create_team(&team).await {
            Ok(created) => info!(team = %created.slug, maintainer = %params.creator, "created maintainers team"),
            Err(e) if e.is_already_exists() => info!(team = %name, "maintainers team already exists"),
            Err(e) => return Err(e.into()),
        }

        let grants = std::iter::once((name.as_str(), TeamPermission::Maintain)).chain(
            self.args
                .additional_memberships
                .iter()
                .map(|m| (m.team_name.as_str(), m.permission)),
        );
        for (team_name, permission) in grants {
            let slug = slugify(team_name);
            self.client
                .add_team_repository(&slug, &params.repo, permission)
                .await?;
            info!(team = %slug, repository = %params.repo, ?permission, "granted team access");
        }
        Ok(())
    }
}

/// The URL slug GitHub derives from a team name.
///
/// ```text
/// "New Repo Maintainers" -> "new-repo-maintainers"
/// ```
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
