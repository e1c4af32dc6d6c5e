//! The action catalog.
//!
//! An action is a long-lived handler built once from an [`ActionSpec`] at
//! startup. For every event it is registered for, an extractor turns the
//! event into the action's parameters (or declines it with
//! [`ActionError::Skip`]) and the action's [`WebhookHandler::handle`] does
//! the work.
//!
//! | Action | Events |
//! |---|---|
//! | `aggregate-releases` | release published, tag push (GitHub and GitLab) |
//! | `distribute-releases` | tag push (GitHub and GitLab) |
//! | `yaml-translate-releases` | release published, tag push |
//! | `release-drafter` | release published, pull request merged |
//! | `repository-maintainers` | repository created |
//! | `docs-preview-comment` | pull request opened |
//! | `issue-comment-handler` | issue comment created |
//! | `project-item-add` | issue or pull request opened |
//! | `project-v2-item` | project item edited |
//! | `labels-on-creation` | issue or pull request opened |
//!
//! [`ActionSpec`]: crate::config::ActionSpec

mod aggregate;
mod common;
mod distribute;
mod docs_preview;
mod issue_comments;
mod labels;
mod maintainers;
mod projects;
mod registration;
mod release_drafter;
mod yaml_translate;

use std::future::Future;

use thiserror::Error;

use crate::config::ConfigError;
use crate::git::GitError;
use crate::github::GitHubApiError;
use crate::patch::PatchError;

pub use aggregate::{AggregateArgs, AggregateReleases};
pub use common::{FreezeState, freeze_state};
pub use distribute::{DistributeArgs, DistributeReleases};
pub use docs_preview::{DocsPreviewArgs, DocsPreviewComment};
pub use issue_comments::{IssueCommentArgs, IssueCommentHandler};
pub use labels::{LabelsArgs, LabelsOnCreation};
pub use maintainers::{MaintainersArgs, RepositoryMaintainers};
pub use projects::{ProjectItemAdd, ProjectItemAddArgs, ProjectV2Item, ProjectV2ItemArgs};
pub use registration::{Client, Clients, register_action, register_webhook_actions};
pub use release_drafter::{Bump, NextVersion, ReleaseDrafter, ReleaseDrafterArgs};
pub use yaml_translate::{YamlTranslateArgs, YamlTranslateReleases};

/// Errors returned by extractors and handlers.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action consciously declines the event. Not a failure.
    #[error("skipped: {0}")]
    Skip(String),

    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    #[error("git: {0}")]
    Git(#[from] GitError),

    #[error("patch: {0}")]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Some targets of a fan-out failed; the others completed.
    #[error("{} target(s) failed: {}", .0.len(), .0.join("; "))]
    Targets(Vec<String>),

    #[error("{0}")]
    Other(String),
}

impl ActionError {
    pub fn skip(reason: impl Into<String>) -> Self {
        ActionError::Skip(reason.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ActionError::Skip(_))
    }
}

/// A handler for parameters of type `P`.
///
/// One action may implement this for several parameter types, one per
/// event it reacts to.
pub trait WebhookHandler<P>: Send + Sync + 'static {
    fn handle(&self, params: P) -> impl Future<Output = Result<(), ActionError>> + Send;
}
