//! Webhook payload parser.
//!
//! Raw JSON payloads are decoded into the typed events of
//! [`events`](super::events). The event type comes from the `X-GitHub-Event`
//! or `X-Gitlab-Event` header:
//!
//! - unknown event types return `Ok(None)` and are acknowledged without action
//! - malformed payloads of known types return `Err`
//!
//! Unknown JSON fields are ignored.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{CommentId, NodeId, PrNumber, RepoId};

use super::events::{
    IssueCommentEvent, IssuesEvent, ProjectV2ItemEvent, PullRequestEvent, PushEvent, ReleaseEvent,
    RepositoryEvent, TagPushEvent, WebhookEvent,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has an invalid value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a GitHub webhook payload.
///
/// ```
/// use metal_robot::webhooks::{WebhookEvent, parse_webhook};
///
/// let payload = br#"{
///     "ref": "refs/tags/v0.15.1",
///     "created": true,
///     "deleted": false,
///     "repository": { "owner": { "login": "metal-stack" }, "name": "metal-api" },
///     "sender": { "login": "alice" }
/// }"#;
///
/// let Some(WebhookEvent::Push(push)) = parse_webhook("push", payload).unwrap() else {
///     panic!("expected a push event");
/// };
/// assert_eq!(push.created_tag(), Some("v0.15.1"));
/// assert!(parse_webhook("star", b"{}").unwrap().is_none());
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<WebhookEvent>, ParseError> {
    let event = match event_type {
        "release" => WebhookEvent::Release(parse_release(payload)?),
        "push" => WebhookEvent::Push(parse_push(payload)?),
        "pull_request" => WebhookEvent::PullRequest(parse_pull_request(payload)?),
        "issue_comment" => WebhookEvent::IssueComment(parse_issue_comment(payload)?),
        "repository" => WebhookEvent::Repository(parse_repository(payload)?),
        "issues" => WebhookEvent::Issues(parse_issues(payload)?),
        "projects_v2_item" => WebhookEvent::ProjectV2Item(parse_project_item(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// Parses a GitLab webhook payload.
pub fn parse_gitlab_webhook(
    event_type: &str,
    payload: &[u8],
) -> Result<Option<WebhookEvent>, ParseError> {
    match event_type {
        "Tag Push Hook" => Ok(Some(WebhookEvent::TagPush(parse_tag_push(payload)?))),
        _ => Ok(None),
    }
}

// ─── Shared payload pieces ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawUser,
    name: String,
}

impl RawRepository {
    fn into_repo_id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

// ─── release ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawReleasePayload {
    action: String,
    release: RawRelease,
    repository: RawRepository,
    sender: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    name: Option<String>,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    html_url: Option<String>,
}

fn parse_release(payload: &[u8]) -> Result<ReleaseEvent, ParseError> {
    let raw: RawReleasePayload = serde_json::from_slice(payload)?;
    Ok(ReleaseEvent {
        action: raw.action.as_str().into(),
        repo: raw.repository.into_repo_id(),
        tag: raw.release.tag_name,
        name: raw.release.name,
        body: raw.release.body.unwrap_or_default(),
        draft: raw.release.draft,
        prerelease: raw.release.prerelease,
        html_url: raw.release.html_url,
        sender: raw.sender.login,
    })
}

// ─── push ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    created: bool,
    #[serde(default)]
    deleted: bool,
    repository: RawRepository,
    sender: RawUser,
}

fn parse_push(payload: &[u8]) -> Result<PushEvent, ParseError> {
    let raw: RawPushPayload = serde_json::from_slice(payload)?;
    Ok(PushEvent {
        repo: raw.repository.into_repo_id(),
        git_ref: raw.git_ref,
        created: raw.created,
        deleted: raw.deleted,
        sender: raw.sender.login,
    })
}

// ─── pull_request ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
    sender: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    node_id: String,
    title: String,
    body: Option<String>,
    #[serde(default)]
    merged: bool,
    user: RawUser,
    head: RawRef,
    base: RawRef,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

fn parse_pull_request(payload: &[u8]) -> Result<PullRequestEvent, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
    let pr = raw.pull_request;
    Ok(PullRequestEvent {
        action: raw.action.as_str().into(),
        repo: raw.repository.into_repo_id(),
        number: PrNumber(pr.number),
        node_id: NodeId::new(pr.node_id),
        title: pr.title,
        body: pr.body.unwrap_or_default(),
        author: pr.user.login,
        merged: pr.merged,
        head_ref: pr.head.ref_name,
        base_ref: pr.base.ref_name,
        html_url: pr.html_url,
        sender: raw.sender.login,
    })
}

// ─── issue_comment ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    comment: RawComment,
    issue: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    body: Option<String>,
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    // Present only when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
}

fn parse_issue_comment(payload: &[u8]) -> Result<IssueCommentEvent, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;
    Ok(IssueCommentEvent {
        action: raw.action.as_str().into(),
        repo: raw.repository.into_repo_id(),
        issue_number: PrNumber(raw.issue.number),
        is_pull_request: raw.issue.pull_request.is_some(),
        comment_id: CommentId(raw.comment.id),
        body: raw.comment.body.unwrap_or_default(),
        author: raw.comment.user.login,
    })
}

// ─── repository ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawRepositoryPayload {
    action: String,
    repository: RawRepository,
    sender: RawUser,
}

fn parse_repository(payload: &[u8]) -> Result<RepositoryEvent, ParseError> {
    let raw: RawRepositoryPayload = serde_json::from_slice(payload)?;
    Ok(RepositoryEvent {
        action: raw.action.as_str().into(),
        repo: raw.repository.into_repo_id(),
        sender: raw.sender.login,
    })
}

// ─── issues ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: RawFullIssue,
    repository: RawRepository,
    sender: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawFullIssue {
    number: u64,
    node_id: String,
    title: String,
}

fn parse_issues(payload: &[u8]) -> Result<IssuesEvent, ParseError> {
    let raw: RawIssuesPayload = serde_json::from_slice(payload)?;
    Ok(IssuesEvent {
        action: raw.action.as_str().into(),
        repo: raw.repository.into_repo_id(),
        number: PrNumber(raw.issue.number),
        node_id: NodeId::new(raw.issue.node_id),
        title: raw.issue.title,
        sender: raw.sender.login,
    })
}

// ─── projects_v2_item ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawProjectItemPayload {
    action: String,
    projects_v2_item: RawProjectItem,
    changes: Option<RawChanges>,
    organization: RawUser,
    sender: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawProjectItem {
    project_node_id: String,
    content_node_id: String,
    content_type: String,
}

#[derive(Debug, Deserialize)]
struct RawChanges {
    field_value: Option<RawFieldValue>,
}

#[derive(Debug, Deserialize)]
struct RawFieldValue {
    field_name: Option<String>,
}

fn parse_project_item(payload: &[u8]) -> Result<ProjectV2ItemEvent, ParseError> {
    let raw: RawProjectItemPayload = serde_json::from_slice(payload)?;
    Ok(ProjectV2ItemEvent {
        action: raw.action.as_str().into(),
        organization: raw.organization.login,
        project_node_id: NodeId::new(raw.projects_v2_item.project_node_id),
        content_node_id: NodeId::new(raw.projects_v2_item.content_node_id),
        content_type: raw.projects_v2_item.content_type,
        changed_field: raw
            .changes
            .and_then(|c| c.field_value)
            .and_then(|f| f.field_name),
        sender: raw.sender.login,
    })
}

// ─── GitLab: Tag Push Hook ────────────────────────────────────────────────────

const NULL_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
struct RawTagPushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    after: Option<String>,
    #[serde(default)]
    user_username: String,
    project: RawGitLabProject,
}

#[derive(Debug, Deserialize)]
struct RawGitLabProject {
    name: String,
    path_with_namespace: String,
}

fn parse_tag_push(payload: &[u8]) -> Result<TagPushEvent, ParseError> {
    let raw: RawTagPushPayload = serde_json::from_slice(payload)?;
    if !raw.git_ref.starts_with("refs/tags/") {
        return Err(ParseError::InvalidField {
            field: "ref",
            value: raw.git_ref,
        });
    }
    Ok(TagPushEvent {
        project_path: raw.project.path_with_namespace,
        project_name: raw.project.name,
        git_ref: raw.git_ref,
        deleted: raw.after.as_deref() == Some(NULL_SHA),
        user: raw.user_username,
    })
}
