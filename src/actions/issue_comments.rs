//! `issue-comment-handler`: slash-commands for repository admins.
//!
//! Only the first command of a comment is executed, and only when its author
//! has admin permission on the repository. Executed commands are acknowledged
//! with a reaction on the comment.

use serde::Deserialize;
use tracing::info;

use crate::commands::{Command, parse_command};
use crate::config::ConfigError;
use crate::dispatch::MultiLock;
use crate::git::WorkingCopy;
use crate::github::GitHubClient;
use crate::github::models::{NewPullRequest, PullRequest};
use crate::types::{CommentId, PrNumber};
use crate::webhooks::{CommentAction, IssueCommentEvent};

use super::aggregate::{AggregateArgs, AggregateReleases};
use super::common::{ensure_pull_request, require_listed};
use super::{ActionError, WebhookHandler};

const ADMIN: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IssueCommentArgs {
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Aggregation run by `/bump-release`.
    pub bump_release: Option<AggregateArgs>,
}

/// A comment was posted on an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCreated {
    pub repo: String,
    pub number: PrNumber,
    pub is_pull_request: bool,
    pub comment_id: CommentId,
    pub body: String,
    pub author: String,
}

pub(crate) fn comment_created(event: &IssueCommentEvent) -> Result<CommentCreated, ActionError> {
    if event.action != CommentAction::Created {
        return Err(ActionError::skip(format!("comment action {}", event.action)));
    }
    Ok(CommentCreated {
        repo: event.repo.repo.clone(),
        number: event.issue_number,
        is_pull_request: event.is_pull_request,
        comment_id: event.comment_id,
        body: event.body.clone(),
        author: event.author.clone(),
    })
}

#[derive(Debug)]
pub struct IssueCommentHandler {
    client: GitHubClient,
    repositories: Vec<String>,
    bump_release: Option<AggregateReleases>,
}

impl IssueCommentHandler {
    pub fn new(
        client: GitHubClient,
        args: IssueCommentArgs,
        locks: MultiLock,
    ) -> Result<Self, ConfigError> {
        let bump_release = args
            .bump_release
            .map(|aggregate| AggregateReleases::new(client.clone(), aggregate, locks))
            .transpose()?;
        Ok(IssueCommentHandler {
            client,
            repositories: args.repositories,
            bump_release,
        })
    }

    async fn pull_request(&self, comment: &CommentCreated) -> Result<PullRequest, ActionError> {
        if !comment.is_pull_request {
            return Err(ActionError::skip(format!(
                "{} is not a pull request",
                comment.number
            )));
        }
        Ok(self
            .client
            .get_pull_request(&comment.repo, comment.number.0)
            .await?)
    }

    /// Pushes the head of a fork pull request into the repository so that
    /// CI runs with the repository's secrets.
    async fn ok_to_build(&self, comment: &CommentCreated) -> Result<(), ActionError> {
        let pr = self.pull_request(comment).await?;
        if !pr.is_from_fork() {
            return Err(ActionError::skip(format!(
                "{} does not come from a fork",
                comment.number
            )));
        }
        let Some(fork) = &pr.head.repo else {
            return Err(ActionError::skip("fork of the pull request was deleted"));
        };

        let branch = format!("fork-build/{}", pr.number);
        let source = self.client.public_remote_url(&fork.full_name);
        let target = self.client.remote_url(&comment.repo).await?;
        WorkingCopy::push_across_remotes(&source, &pr.head.ref_name, &target, &branch).await?;

        let build = NewPullRequest {
            title: format!("Fork build for #{}", pr.number),
            head: branch,
            base: pr.base.ref_name.clone(),
            body: Some(format!(
                "Builds {}:{} of #{}. Do not merge.",
                fork.full_name, pr.head.ref_name, pr.number
            )),
            draft: true,
        };
        ensure_pull_request(&self.client, &comment.repo, &build).await
    }

    async fn tag(&self, comment: &CommentCreated, tag: &str) -> Result<(), ActionError> {
        let pr = self.pull_request(comment).await?;
        if pr.is_from_fork() {
            return Err(ActionError::skip(format!(
                "{} comes from a fork, not tagging",
                comment.number
            )));
        }
        let remote = self.client.remote_url(&comment.repo).await?;
        WorkingCopy::create_tag(&remote, &pr.head.ref_name, tag).await?;
        Ok(())
    }

    async fn bump_release(&self, repository: &str, version: &str) -> Result<(), ActionError> {
        let Some(aggregate) = &self.bump_release else {
            return Err(ActionError::skip("bump-release is not configured"));
        };
        aggregate.aggregate(repository, version, false).await
    }
}

impl WebhookHandler<CommentCreated> for IssueCommentHandler {
    async fn handle(&self, comment: CommentCreated) -> Result<(), ActionError> {
        require_listed(&self.repositories, &comment.repo)?;
        let Some(command) = parse_command(&comment.body) else {
            return Err(ActionError::skip("no command in comment"));
        };

        let permission = self
            .client
            .user_permission(&comment.repo, &comment.author)
            .await?;
        if permission != ADMIN {
            return Err(ActionError::skip(format!(
                "{} has {} permission, {} requires admin",
                comment.author, permission, command
            )));
        }

        info!(
            repository = %comment.repo,
            issue = %comment.number,
            author = %comment.author,
            command = command.name(),
            "executing command"
        );
        let reaction = match &command {
            Command::OkToBuild => {
                self.ok_to_build(&comment).await?;
                "rocket"
            }
            Command::Tag(tag) => {
                self.tag(&comment, tag).await?;
                "rocket"
            }
            Command::Freeze | Command::Unfreeze => "+1",
            Command::BumpRelease {
                repository,
                version,
            } => {
                self.bump_release(repository, version).await?;
                "rocket"
            }
        };

        self.client
            .add_issue_comment_reaction(&comment.repo, comment.comment_id.0, reaction)
            .await?;
        Ok(())
    }
}
