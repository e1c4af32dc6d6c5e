//! `docs-preview-comment`: points new pull requests of the docs repository
//! at their preview deployment.

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::github::GitHubClient;
use crate::template::{placeholder_count, render};

use super::common::ContentOpened;
use super::{ActionError, WebhookHandler};

fn default_repository() -> String {
    "docs".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DocsPreviewArgs {
    #[serde(default = "default_repository")]
    pub repository: String,
    /// Comment body; `%s` is replaced with the pull request number.
    pub comment_template: String,
}

#[derive(Debug)]
pub struct DocsPreviewComment {
    client: GitHubClient,
    args: DocsPreviewArgs,
}

impl DocsPreviewComment {
    pub fn new(client: GitHubClient, args: DocsPreviewArgs) -> Result<Self, ConfigError> {
        if placeholder_count(&args.comment_template) != 1 {
            return Err(ConfigError::Invalid(format!(
                "comment-template {:?} needs exactly one placeholder for the pull request number",
                args.comment_template
            )));
        }
        Ok(DocsPreviewComment { client, args })
    }
}

impl WebhookHandler<ContentOpened> for DocsPreviewComment {
    async fn handle(&self, opened: ContentOpened) -> Result<(), ActionError> {
        if opened.repo != self.args.repository {
            return Err(ActionError::skip(format!(
                "{} is not the docs repository",
                opened.repo
            )));
        }

        let body = render(&self.args.comment_template, &[&opened.number.0.to_string()]);
        let comments = self
            .client
            .list_issue_comments_desc(&opened.repo, opened.number.0)
            .await?;
        if comments.iter().any(|c| c.body.as_deref() == Some(body.as_str())) {
            debug!(pull_request = %opened.number, "preview comment already posted");
            return Ok(());
        }

        self.client
            .create_issue_comment(&opened.repo, opened.number.0, &body)
            .await?;
        info!(repository = %opened.repo, pull_request = %opened.number, "posted docs preview comment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::mock::{MockGitHub, comment_json};
    use crate::types::{NodeId, PrNumber};
    use axum::http::Method;

    const COMMENTS: &str = "/repos/metal-stack/docs/issues/7/comments";
    const PREVIEW: &str = "Preview: https://docs.metal-stack.io/previews/PR7/";

    fn args() -> DocsPreviewArgs {
        serde_yaml::from_str(
            "comment-template: \"Preview: https://docs.metal-stack.io/previews/PR%d/\"",
        )
        .unwrap()
    }

    fn opened(repo: &str) -> ContentOpened {
        ContentOpened {
            repo: repo.to_string(),
            number: PrNumber(7),
            node_id: NodeId::new("PR_7"),
        }
    }

    #[tokio::test]
    async fn posts_preview_link() {
        let mock = MockGitHub::new();
        mock.on(Method::GET, COMMENTS, 200, serde_json::json!([]));
        mock.on(Method::POST, COMMENTS, 201, comment_json(1, PREVIEW, "2024-05-01T10:00:00Z"));
        let action = DocsPreviewComment::new(mock.client("metal-stack").await, args()).unwrap();

        action.handle(opened("docs")).await.unwrap();

        let posted = mock.requests_to(Method::POST, COMMENTS);
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].body["body"], PREVIEW);
    }

    #[tokio::test]
    async fn does_not_comment_twice() {
        let mock = MockGitHub::new();
        mock.on(
            Method::GET,
            COMMENTS,
            200,
            serde_json::json!([comment_json(1, PREVIEW, "2024-05-01T10:00:00Z")]),
        );
        let action = DocsPreviewComment::new(mock.client("metal-stack").await, args()).unwrap();

        action.handle(opened("docs")).await.unwrap();
        assert!(mock.requests_to(Method::POST, COMMENTS).is_empty());
    }

    #[tokio::test]
    async fn other_repositories_are_skipped() {
        let mock = MockGitHub::new();
        let action = DocsPreviewComment::new(mock.client("metal-stack").await, args()).unwrap();

        assert!(action.handle(opened("metal-api")).await.unwrap_err().is_skip());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn template_needs_a_placeholder() {
        let client = MockGitHub::new().client("metal-stack").await;
        let args: DocsPreviewArgs = serde_yaml::from_str("comment-template: static").unwrap();
        assert!(DocsPreviewComment::new(client, args).is_err());
    }
}
