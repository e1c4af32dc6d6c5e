//! Typed webhook events.
//!
//! Each event kind is its own type so that the handler registry can key
//! handlers by type. [`WebhookEvent`] wraps them for parsing and logging.
//!
//! GitHub events:
//!
//! - `release` - component releases (aggregation, release drafter)
//! - `push` - tag pushes (aggregation, distribution)
//! - `pull_request` - merged PRs (release drafter), opened PRs (docs preview, labels, projects)
//! - `issue_comment` - slash-commands
//! - `repository` - repository creation (maintainer teams)
//! - `issues` - opened issues (labels, projects)
//! - `projects_v2_item` - project board transitions
//!
//! GitLab events:
//!
//! - `Tag Push Hook` - tag pushes (aggregation, distribution)

use std::fmt;

use crate::types::{CommentId, NodeId, PrNumber, RepoId};

macro_rules! action_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// Any action the bot does not act on.
            Other(String),
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $($text => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Other(s) => s,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

action_enum!(
    /// Action of a `release` event.
    ReleaseAction { Published => "published" }
);

action_enum!(
    /// Action of a `pull_request` event.
    PrAction { Opened => "opened", Closed => "closed" }
);

action_enum!(
    /// Action of an `issue_comment` event.
    CommentAction { Created => "created", Edited => "edited", Deleted => "deleted" }
);

action_enum!(
    /// Action of a `repository` event.
    RepositoryAction { Created => "created" }
);

action_enum!(
    /// Action of an `issues` event.
    IssueAction { Opened => "opened" }
);

action_enum!(
    /// Action of a `projects_v2_item` event.
    ProjectItemAction { Created => "created", Edited => "edited" }
);

/// A release was created, published, edited, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub action: ReleaseAction,
    pub repo: RepoId,
    pub tag: String,
    pub name: Option<String>,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
    pub html_url: Option<String>,
    pub sender: String,
}

/// Commits or a tag were pushed to GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo: RepoId,
    pub git_ref: String,
    pub created: bool,
    pub deleted: bool,
    pub sender: String,
}

impl PushEvent {
    /// The tag name if this push created a tag.
    pub fn created_tag(&self) -> Option<&str> {
        if !self.created || self.deleted {
            return None;
        }
        self.git_ref.strip_prefix("refs/tags/")
    }
}

/// A tag was pushed to GitLab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPushEvent {
    /// `namespace/project`
    pub project_path: String,
    pub project_name: String,
    pub git_ref: String,
    /// `true` when the tag was deleted.
    pub deleted: bool,
    pub user: String,
}

impl TagPushEvent {
    pub fn tag(&self) -> Option<&str> {
        if self.deleted {
            return None;
        }
        self.git_ref.strip_prefix("refs/tags/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: PrAction,
    pub repo: RepoId,
    pub number: PrNumber,
    pub node_id: NodeId,
    pub title: String,
    pub body: String,
    pub author: String,
    pub merged: bool,
    pub head_ref: String,
    pub base_ref: String,
    pub html_url: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub action: CommentAction,
    pub repo: RepoId,
    /// Issue or pull request number.
    pub issue_number: PrNumber,
    /// Whether the comment was made on a pull request.
    pub is_pull_request: bool,
    pub comment_id: CommentId,
    pub body: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEvent {
    pub action: RepositoryAction,
    pub repo: RepoId,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuesEvent {
    pub action: IssueAction,
    pub repo: RepoId,
    pub number: PrNumber,
    pub node_id: NodeId,
    pub title: String,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectV2ItemEvent {
    pub action: ProjectItemAction,
    pub organization: String,
    pub project_node_id: NodeId,
    /// The issue or pull request the item refers to.
    pub content_node_id: NodeId,
    /// `Issue`, `PullRequest` or `DraftIssue`.
    pub content_type: String,
    /// Name of the changed field, for `edited` events.
    pub changed_field: Option<String>,
    pub sender: String,
}

/// A parsed webhook event of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Release(ReleaseEvent),
    Push(PushEvent),
    TagPush(TagPushEvent),
    PullRequest(PullRequestEvent),
    IssueComment(IssueCommentEvent),
    Repository(RepositoryEvent),
    Issues(IssuesEvent),
    ProjectV2Item(ProjectV2ItemEvent),
}

impl WebhookEvent {
    /// The event name as sent by the forge.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::Release(_) => "release",
            WebhookEvent::Push(_) => "push",
            WebhookEvent::TagPush(_) => "tag_push",
            WebhookEvent::PullRequest(_) => "pull_request",
            WebhookEvent::IssueComment(_) => "issue_comment",
            WebhookEvent::Repository(_) => "repository",
            WebhookEvent::Issues(_) => "issues",
            WebhookEvent::ProjectV2Item(_) => "projects_v2_item",
        }
    }

    /// The action sub-type, if the event kind has one.
    pub fn action(&self) -> Option<&str> {
        match self {
            WebhookEvent::Release(e) => Some(e.action.as_str()),
            WebhookEvent::PullRequest(e) => Some(e.action.as_str()),
            WebhookEvent::IssueComment(e) => Some(e.action.as_str()),
            WebhookEvent::Repository(e) => Some(e.action.as_str()),
            WebhookEvent::Issues(e) => Some(e.action.as_str()),
            WebhookEvent::ProjectV2Item(e) => Some(e.action.as_str()),
            WebhookEvent::Push(_) | WebhookEvent::TagPush(_) => None,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            WebhookEvent::Release(e) => &e.sender,
            WebhookEvent::Push(e) => &e.sender,
            WebhookEvent::TagPush(e) => &e.user,
            WebhookEvent::PullRequest(e) => &e.sender,
            WebhookEvent::IssueComment(e) => &e.author,
            WebhookEvent::Repository(e) => &e.sender,
            WebhookEvent::Issues(e) => &e.sender,
            WebhookEvent::ProjectV2Item(e) => &e.sender,
        }
    }

    /// Organization (or GitLab namespace) the event belongs to.
    pub fn organization(&self) -> &str {
        match self {
            WebhookEvent::TagPush(e) => e
                .project_path
                .split_once('/')
                .map_or(e.project_path.as_str(), |(ns, _)| ns),
            WebhookEvent::ProjectV2Item(e) => &e.organization,
            other => other.repo().map_or("", |r| r.owner.as_str()),
        }
    }

    /// The repository the event originated from, if any.
    pub fn repo(&self) -> Option<&RepoId> {
        match self {
            WebhookEvent::Release(e) => Some(&e.repo),
            WebhookEvent::Push(e) => Some(&e.repo),
            WebhookEvent::PullRequest(e) => Some(&e.repo),
            WebhookEvent::IssueComment(e) => Some(&e.repo),
            WebhookEvent::Repository(e) => Some(&e.repo),
            WebhookEvent::Issues(e) => Some(&e.repo),
            WebhookEvent::TagPush(_) | WebhookEvent::ProjectV2Item(_) => None,
        }
    }

    /// Web URL of the originating repository.
    pub fn repository_url(&self) -> Option<String> {
        match self {
            WebhookEvent::TagPush(e) => Some(format!("https://gitlab.com/{}", e.project_path)),
            other => other
                .repo()
                .map(|r| format!("https://github.com/{}/{}", r.owner, r.repo)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(git_ref: &str, created: bool, deleted: bool) -> PushEvent {
        PushEvent {
            repo: RepoId::new("metal-stack", "metal-api"),
            git_ref: git_ref.to_string(),
            created,
            deleted,
            sender: "alice".to_string(),
        }
    }

    #[test]
    fn created_tag() {
        assert_eq!(push("refs/tags/v0.15.1", true, false).created_tag(), Some("v0.15.1"));
        assert_eq!(push("refs/tags/v0.15.1", false, true).created_tag(), None);
        assert_eq!(push("refs/heads/master", true, false).created_tag(), None);
    }

    #[test]
    fn actions_round_trip_text() {
        assert_eq!(PrAction::from("closed"), PrAction::Closed);
        assert_eq!(PrAction::from("synchronize").as_str(), "synchronize");
        assert_eq!(ReleaseAction::Published.to_string(), "published");
    }

    #[test]
    fn gitlab_context() {
        let event = WebhookEvent::TagPush(TagPushEvent {
            project_path: "metal-stack/metal-ui".to_string(),
            project_name: "metal-ui".to_string(),
            git_ref: "refs/tags/v1.0.0".to_string(),
            deleted: false,
            user: "bob".to_string(),
        });
        assert_eq!(event.kind(), "tag_push");
        assert_eq!(event.organization(), "metal-stack");
        assert_eq!(event.sender(), "bob");
        assert_eq!(
            event.repository_url().as_deref(),
            Some("https://gitlab.com/metal-stack/metal-ui")
        );
    }
}
