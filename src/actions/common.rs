//! Building blocks shared by the actions: event extractors, release freeze
//! detection and the clone-patch-push-PR cycle.

use tracing::{debug, info};

use crate::commands::{Command, parse_command};
use crate::dispatch::MultiLockGuard;
use crate::git::{CommitIdentity, GitError, WorkingCopy};
use crate::github::GitHubClient;
use crate::github::models::{IssueComment, NewPullRequest, PullRequest, PullRequestFilter};
use crate::patch::{FileSystem, PatchError};
use crate::types::{NodeId, PrNumber};
use crate::webhooks::{
    IssueAction, IssuesEvent, PrAction, PullRequestEvent, PushEvent, ReleaseAction, ReleaseEvent,
    TagPushEvent,
};

use super::ActionError;

pub(crate) fn default_release_branch() -> String {
    "develop".to_string()
}

pub(crate) fn default_base_branch() -> String {
    "master".to_string()
}

pub(crate) fn default_release_pr_title() -> String {
    "Next release".to_string()
}

pub(crate) fn default_bump_template() -> String {
    "Bump %s to version %s".to_string()
}

// ─── Event parameters ─────────────────────────────────────────────────────────

/// Where a released component lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    GitHub,
    /// `namespace/project` on GitLab.
    GitLab { project_path: String },
}

/// A component released a new tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseParams {
    /// Repository (or GitLab project) name of the component.
    pub source: String,
    pub tag: String,
    pub origin: Origin,
}

pub(crate) fn release_published(event: &ReleaseEvent) -> Result<ReleaseParams, ActionError> {
    if event.action != ReleaseAction::Published {
        return Err(ActionError::skip(format!("release action {}", event.action)));
    }
    if event.draft {
        return Err(ActionError::skip("release is a draft"));
    }
    Ok(ReleaseParams {
        source: event.repo.repo.clone(),
        tag: event.tag.clone(),
        origin: Origin::GitHub,
    })
}

pub(crate) fn github_tag_push(event: &PushEvent) -> Result<ReleaseParams, ActionError> {
    let tag = event
        .created_tag()
        .ok_or_else(|| ActionError::skip("push did not create a tag"))?;
    Ok(ReleaseParams {
        source: event.repo.repo.clone(),
        tag: tag.to_string(),
        origin: Origin::GitHub,
    })
}

pub(crate) fn gitlab_tag_push(event: &TagPushEvent) -> Result<ReleaseParams, ActionError> {
    let tag = event
        .tag()
        .ok_or_else(|| ActionError::skip("tag was deleted"))?;
    Ok(ReleaseParams {
        source: event.project_name.clone(),
        tag: tag.to_string(),
        origin: Origin::GitLab {
            project_path: event.project_path.clone(),
        },
    })
}

/// An issue or pull request was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentOpened {
    pub repo: String,
    pub number: PrNumber,
    pub node_id: NodeId,
}

pub(crate) fn issue_opened(event: &IssuesEvent) -> Result<ContentOpened, ActionError> {
    if event.action != IssueAction::Opened {
        return Err(ActionError::skip(format!("issue action {}", event.action)));
    }
    Ok(ContentOpened {
        repo: event.repo.repo.clone(),
        number: event.number,
        node_id: event.node_id.clone(),
    })
}

pub(crate) fn pull_request_opened(event: &PullRequestEvent) -> Result<ContentOpened, ActionError> {
    if event.action != PrAction::Opened {
        return Err(ActionError::skip(format!("pull request action {}", event.action)));
    }
    Ok(ContentOpened {
        repo: event.repo.repo.clone(),
        number: event.number,
        node_id: event.node_id.clone(),
    })
}

/// Returns a skip error unless `repo` is listed. An empty list admits all.
pub(crate) fn require_listed(repositories: &[String], repo: &str) -> Result<(), ActionError> {
    if repositories.is_empty() || repositories.iter().any(|r| r == repo) {
        Ok(())
    } else {
        Err(ActionError::skip(format!("repository {} is not configured", repo)))
    }
}

// ─── Release freeze ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    Frozen,
    Open,
}

/// Computes the freeze state from comments ordered newest first.
///
/// The newest `/freeze` or `/unfreeze` command wins. Without either the
/// release is open.
///
/// ```
/// use metal_robot::actions::{FreezeState, freeze_state};
///
/// assert_eq!(freeze_state(["/freeze"]), FreezeState::Frozen);
/// assert_eq!(freeze_state(["/unfreeze", "/freeze"]), FreezeState::Open);
/// assert_eq!(freeze_state(["LGTM"]), FreezeState::Open);
/// ```
pub fn freeze_state<'a>(bodies_newest_first: impl IntoIterator<Item = &'a str>) -> FreezeState {
    bodies_newest_first
        .into_iter()
        .find_map(|body| match parse_command(body) {
            Some(Command::Freeze) => Some(FreezeState::Frozen),
            Some(Command::Unfreeze) => Some(FreezeState::Open),
            _ => None,
        })
        .unwrap_or(FreezeState::Open)
}

fn comment_bodies(comments: &[IssueComment]) -> impl Iterator<Item = &str> {
    comments.iter().filter_map(|c| c.body.as_deref())
}

// ─── Release pull request ─────────────────────────────────────────────────────

/// The long-lived pull request collecting bumps on a release branch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReleasePullRequest<'a> {
    pub repository: &'a str,
    pub branch: &'a str,
    pub base: &'a str,
    pub title: &'a str,
}

impl ReleasePullRequest<'_> {
    pub async fn find_open(
        &self,
        client: &GitHubClient,
    ) -> Result<Option<PullRequest>, ActionError> {
        let filter = PullRequestFilter {
            state: Some("open".to_string()),
            head: Some(format!("{}:{}", client.organization(), self.branch)),
            base: Some(self.base.to_string()),
        };
        let prs = client.list_pull_requests(self.repository, &filter).await?;
        Ok(prs.into_iter().next())
    }

    /// Checks whether the open release pull request is frozen. If it is, a
    /// warning about the blocked `tag` of `source` is posted to it.
    pub async fn warn_if_frozen(
        &self,
        client: &GitHubClient,
        source: &str,
        tag: &str,
    ) -> Result<bool, ActionError> {
        let Some(pr) = self.find_open(client).await? else {
            return Ok(false);
        };
        let comments = client
            .list_issue_comments_desc(self.repository, pr.number)
            .await?;
        if freeze_state(comment_bodies(&comments)) == FreezeState::Open {
            return Ok(false);
        }

        info!(
            repository = %self.repository,
            pull_request = pr.number,
            source,
            tag,
            "release is frozen, not aggregating"
        );
        let warning = format!(
            ":warning: Release `{}` in repository {} was not aggregated because the release is frozen. Comment `/unfreeze` to continue.",
            tag, source
        );
        client
            .create_issue_comment(self.repository, pr.number, &warning)
            .await?;
        Ok(true)
    }

    pub async fn ensure(&self, client: &GitHubClient) -> Result<(), ActionError> {
        ensure_pull_request(
            client,
            self.repository,
            &NewPullRequest {
                title: self.title.to_string(),
                head: self.branch.to_string(),
                base: self.base.to_string(),
                body: None,
                draft: false,
            },
        )
        .await
    }
}

/// Opens a pull request unless one for the same head and base is open.
pub(crate) async fn ensure_pull_request(
    client: &GitHubClient,
    repo: &str,
    pr: &NewPullRequest,
) -> Result<(), ActionError> {
    match client.create_pull_request(repo, pr).await {
        Ok(created) => {
            info!(
                repository = repo,
                pull_request = created.number,
                head = %pr.head,
                base = %pr.base,
                "opened pull request"
            );
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!(repository = repo, head = %pr.head, "pull request already exists");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// ─── Clone, patch, push ───────────────────────────────────────────────────────

/// Clones `branch` of `repo`, lets `patch` edit the files, and commits and
/// pushes the result.
///
/// Returns `false` when the patches left the tree unchanged. The lock is
/// released as soon as the branch is up to date on the remote; any patch
/// error aborts before pushing.
pub(crate) async fn patch_and_push<F>(
    client: &GitHubClient,
    repo: &str,
    branch: &str,
    message: &str,
    lock: &mut MultiLockGuard,
    patch: F,
) -> Result<bool, ActionError>
where
    F: FnOnce(&mut dyn FileSystem) -> Result<(), PatchError>,
{
    let remote = client.remote_url(repo).await?;
    let mut copy = WorkingCopy::clone_and_checkout(&remote, branch, CommitIdentity::default()).await?;
    patch(&mut copy)?;

    let pushed = match copy.commit_and_push(message).await {
        Ok(()) => true,
        Err(GitError::NoChanges) => {
            debug!(repository = repo, branch, "nothing to commit");
            false
        }
        Err(e) => return Err(e.into()),
    };
    lock.release();
    Ok(pushed)
}
