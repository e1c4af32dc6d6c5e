//! Wiring configured actions into the handler registry.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::{ActionKind, ActionSpec, ConfigError, Vcs, WebhookConfig};
use crate::dispatch::{MultiLock, Registry};
use crate::github::GitHubClient;
use crate::gitlab::GitLabClient;
use crate::webhooks::{
    IssueCommentEvent, IssuesEvent, ProjectV2ItemEvent, PullRequestEvent, PushEvent, ReleaseEvent,
    RepositoryEvent, TagPushEvent,
};

use super::aggregate::AggregateReleases;
use super::common::{
    github_tag_push, gitlab_tag_push, issue_opened, pull_request_opened, release_published,
};
use super::distribute::DistributeReleases;
use super::docs_preview::DocsPreviewComment;
use super::issue_comments::{IssueCommentHandler, comment_created};
use super::labels::LabelsOnCreation;
use super::maintainers::{RepositoryMaintainers, repository_created};
use super::projects::{ProjectItemAdd, ProjectV2Item, status_changed};
use super::release_drafter::{ReleaseDrafter, component_release, merged_pull_request};
use super::yaml_translate::YamlTranslateReleases;
use super::{ActionError, WebhookHandler};

/// An authenticated forge client.
#[derive(Debug, Clone)]
pub enum Client {
    GitHub(GitHubClient),
    GitLab(GitLabClient),
}

/// Clients by configured name.
#[derive(Debug, Clone, Default)]
pub struct Clients {
    by_name: HashMap<String, Client>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, client: Client) {
        self.by_name.insert(name.into(), client);
    }

    pub fn github(&self, name: &str) -> Result<GitHubClient, ConfigError> {
        match self.by_name.get(name) {
            Some(Client::GitHub(client)) => Ok(client.clone()),
            Some(Client::GitLab(_)) => Err(ConfigError::Invalid(format!(
                "client {:?} is a GitLab client, a GitHub client is required",
                name
            ))),
            None => Err(ConfigError::Invalid(format!("unknown client {:?}", name))),
        }
    }

    pub fn gitlab(&self, name: &str) -> Result<GitLabClient, ConfigError> {
        match self.by_name.get(name) {
            Some(Client::GitLab(client)) => Ok(client.clone()),
            Some(Client::GitHub(_)) => Err(ConfigError::Invalid(format!(
                "client {:?} is a GitHub client, a GitLab client is required",
                name
            ))),
            None => Err(ConfigError::Invalid(format!("unknown client {:?}", name))),
        }
    }
}

/// Registers `handler` for events of type `E`, translating each event into
/// the handler's parameters with `extract`.
async fn attach<E, P, H>(
    registry: &Registry,
    name: &str,
    handler: &Arc<H>,
    extract: fn(&E) -> Result<P, ActionError>,
) where
    E: Any + Send + Sync,
    P: Send + 'static,
    H: WebhookHandler<P>,
{
    let handler = Arc::clone(handler);
    registry
        .register(name, move |event: Arc<E>| {
            let handler = Arc::clone(&handler);
            async move {
                let params = extract(&event)?;
                handler.handle(params).await
            }
        })
        .await;
}

/// Builds the action described by `spec` and registers it for the events of
/// a webhook of type `vcs`.
pub async fn register_action(
    registry: &Registry,
    vcs: Vcs,
    spec: &ActionSpec,
    clients: &Clients,
    locks: &MultiLock,
) -> Result<(), ConfigError> {
    let name = spec.kind.as_str();
    let client = clients.github(&spec.client)?;

    if vcs == Vcs::Gitlab {
        return match spec.kind {
            ActionKind::AggregateReleases => {
                let action = AggregateReleases::new(client, spec.decode_args()?, locks.clone())?;
                attach::<TagPushEvent, _, _>(registry, name, &Arc::new(action), gitlab_tag_push)
                    .await;
                Ok(())
            }
            ActionKind::DistributeReleases => {
                let action = DistributeReleases::new(client, spec.decode_args()?, locks.clone())?;
                attach::<TagPushEvent, _, _>(registry, name, &Arc::new(action), gitlab_tag_push)
                    .await;
                Ok(())
            }
            ActionKind::YamlTranslateReleases => {
                let action = yaml_translate(client, spec, clients, locks)?;
                attach::<TagPushEvent, _, _>(registry, name, &Arc::new(action), gitlab_tag_push)
                    .await;
                Ok(())
            }
            other => Err(ConfigError::Invalid(format!(
                "action {} is not supported on gitlab webhooks",
                other
            ))),
        };
    }

    match spec.kind {
        ActionKind::AggregateReleases => {
            let action = Arc::new(AggregateReleases::new(
                client,
                spec.decode_args()?,
                locks.clone(),
            )?);
            attach::<ReleaseEvent, _, _>(registry, name, &action, release_published).await;
            attach::<PushEvent, _, _>(registry, name, &action, github_tag_push).await;
        }
        ActionKind::DistributeReleases => {
            let action = Arc::new(DistributeReleases::new(
                client,
                spec.decode_args()?,
                locks.clone(),
            )?);
            attach::<PushEvent, _, _>(registry, name, &action, github_tag_push).await;
        }
        ActionKind::YamlTranslateReleases => {
            let action = Arc::new(yaml_translate(client, spec, clients, locks)?);
            attach::<ReleaseEvent, _, _>(registry, name, &action, release_published).await;
            attach::<PushEvent, _, _>(registry, name, &action, github_tag_push).await;
        }
        ActionKind::ReleaseDrafter => {
            let action = Arc::new(ReleaseDrafter::new(
                client,
                spec.decode_args()?,
                locks.clone(),
            )?);
            attach::<ReleaseEvent, _, _>(registry, name, &action, component_release).await;
            attach::<PullRequestEvent, _, _>(registry, name, &action, merged_pull_request).await;
        }
        ActionKind::RepositoryMaintainers => {
            let action = Arc::new(RepositoryMaintainers::new(client, spec.decode_args()?));
            attach::<RepositoryEvent, _, _>(registry, name, &action, repository_created).await;
        }
        ActionKind::DocsPreviewComment => {
            let action = Arc::new(DocsPreviewComment::new(client, spec.decode_args()?)?);
            attach::<PullRequestEvent, _, _>(registry, name, &action, pull_request_opened).await;
        }
        ActionKind::IssueCommentHandler => {
            let action = Arc::new(IssueCommentHandler::new(
                client,
                spec.decode_args()?,
                locks.clone(),
            )?);
            attach::<IssueCommentEvent, _, _>(registry, name, &action, comment_created).await;
        }
        ActionKind::ProjectItemAdd => {
            let action = Arc::new(ProjectItemAdd::new(client, spec.decode_args()?));
            attach::<IssuesEvent, _, _>(registry, name, &action, issue_opened).await;
            attach::<PullRequestEvent, _, _>(registry, name, &action, pull_request_opened).await;
        }
        ActionKind::ProjectV2Item => {
            let action = Arc::new(ProjectV2Item::new(client, spec.decode_args()?));
            attach::<ProjectV2ItemEvent, _, _>(registry, name, &action, status_changed).await;
        }
        ActionKind::LabelsOnCreation => {
            let action = Arc::new(LabelsOnCreation::new(client, spec.decode_args()?));
            attach::<IssuesEvent, _, _>(registry, name, &action, issue_opened).await;
            attach::<PullRequestEvent, _, _>(registry, name, &action, pull_request_opened).await;
        }
    }
    Ok(())
}

fn yaml_translate(
    client: GitHubClient,
    spec: &ActionSpec,
    clients: &Clients,
    locks: &MultiLock,
) -> Result<YamlTranslateReleases, ConfigError> {
    let args: super::YamlTranslateArgs = spec.decode_args()?;
    let gitlab = args
        .source_client
        .as_deref()
        .map(|name| clients.gitlab(name))
        .transpose()?;
    YamlTranslateReleases::new(client, gitlab, args, locks.clone())
}

/// Registers every action of `webhook` in order.
pub async fn register_webhook_actions(
    registry: &Registry,
    webhook: &WebhookConfig,
    clients: &Clients,
    locks: &MultiLock,
) -> Result<(), ConfigError> {
    for spec in &webhook.actions {
        register_action(registry, webhook.vcs, spec, clients, locks).await?;
        info!(
            serve_path = %webhook.serve_path,
            action = %spec.kind,
            client = %spec.client,
            "registered action"
        );
    }
    Ok(())
}
