//! Project (v2) board automation over GraphQL.
//!
//! `project-item-add` puts newly opened issues and pull requests on a board.
//! `project-v2-item` removes labels from an item's content when its status
//! changes, e.g. dropping `triage` once an issue is scheduled.

use serde::Deserialize;
use tracing::info;

use crate::github::{GitHubClient, label_ids_by_name};
use crate::types::NodeId;
use crate::webhooks::{ProjectItemAction, ProjectV2ItemEvent};

use super::common::{ContentOpened, require_listed};
use super::{ActionError, WebhookHandler};

const STATUS_FIELD: &str = "Status";
const DRAFT_ISSUE: &str = "DraftIssue";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectItemAddArgs {
    pub project_id: String,
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[derive(Debug)]
pub struct ProjectItemAdd {
    client: GitHubClient,
    args: ProjectItemAddArgs,
}

impl ProjectItemAdd {
    pub fn new(client: GitHubClient, args: ProjectItemAddArgs) -> Self {
        ProjectItemAdd { client, args }
    }
}

impl WebhookHandler<ContentOpened> for ProjectItemAdd {
    async fn handle(&self, opened: ContentOpened) -> Result<(), ActionError> {
        require_listed(&self.args.repositories, &opened.repo)?;
        let item = self
            .client
            .add_project_item(&self.args.project_id, opened.node_id.as_str())
            .await?;
        info!(
            repository = %opened.repo,
            number = %opened.number,
            project = %self.args.project_id,
            item = %item,
            "added to project"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectV2ItemArgs {
    pub project_id: String,
    #[serde(default)]
    pub remove_labels: Vec<String>,
}

/// The status of a project item changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChanged {
    pub project_id: NodeId,
    pub content_id: NodeId,
    pub content_type: String,
}

pub(crate) fn status_changed(event: &ProjectV2ItemEvent) -> Result<StatusChanged, ActionError> {
    if event.action != ProjectItemAction::Edited {
        return Err(ActionError::skip(format!("project item action {}", event.action)));
    }
    if event.changed_field.as_deref() != Some(STATUS_FIELD) {
        return Err(ActionError::skip("status field did not change"));
    }
    Ok(StatusChanged {
        project_id: event.project_node_id.clone(),
        content_id: event.content_node_id.clone(),
        content_type: event.content_type.clone(),
    })
}

#[derive(Debug)]
pub struct ProjectV2Item {
    client: GitHubClient,
    args: ProjectV2ItemArgs,
}

impl ProjectV2Item {
    pub fn new(client: GitHubClient, args: ProjectV2ItemArgs) -> Self {
        ProjectV2Item { client, args }
    }
}

impl WebhookHandler<StatusChanged> for ProjectV2Item {
    async fn handle(&self, change: StatusChanged) -> Result<(), ActionError> {
        if change.project_id.as_str() != self.args.project_id {
            return Err(ActionError::skip(format!("project {} is not configured", change.project_id)));
        }
        if change.content_type == DRAFT_ISSUE {
            return Err(ActionError::skip("draft issues have no labels"));
        }

        let labels = self.client.content_labels(change.content_id.as_str()).await?;
        let ids = label_ids_by_name(&labels, &self.args.remove_labels);
        if ids.is_empty() {
            return Err(ActionError::skip("none of the labels to remove are set"));
        }

        self.client
            .remove_labels(change.content_id.as_str(), &ids)
            .await?;
        info!(content = %change.content_id, removed = ids.len(), "removed labels");
        Ok(())
    }
}
