//! `distribute-releases`: spreads a release of one repository to the
//! repositories depending on it.
//!
//! Every target gets its own branch named after the tag and its own pull
//! request. Targets are handled concurrently; a failing target does not stop
//! the others.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{ActionKind, ConfigError};
use crate::dispatch::MultiLock;
use crate::github::GitHubClient;
use crate::github::models::NewPullRequest;
use crate::patch::{PatchSpec, apply_all, validate_all};
use crate::template::{placeholder_count, render};
use crate::types::ReleaseTag;

use super::common::{
    ReleaseParams, default_base_branch, default_bump_template, ensure_pull_request,
    patch_and_push,
};
use super::{ActionError, WebhookHandler};

fn default_branch_template() -> String {
    "auto-generate/%s".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DistributeArgs {
    pub source_repository: String,
    #[serde(default = "default_branch_template")]
    pub branch_template: String,
    #[serde(default = "default_bump_template")]
    pub commit_message_template: String,
    #[serde(default = "default_bump_template")]
    pub pull_request_title_template: String,
    #[serde(default)]
    pub target_repositories: BTreeMap<String, DistributeTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DistributeTarget {
    #[serde(default = "default_base_branch")]
    pub branch_base: String,
    #[serde(default)]
    pub patches: Vec<PatchSpec>,
}

#[derive(Debug)]
pub struct DistributeReleases {
    client: GitHubClient,
    args: DistributeArgs,
    locks: MultiLock,
}

impl DistributeReleases {
    pub fn new(
        client: GitHubClient,
        args: DistributeArgs,
        locks: MultiLock,
    ) -> Result<Self, ConfigError> {
        if placeholder_count(&args.branch_template) != 1 {
            return Err(ConfigError::Invalid(format!(
                "branch-template {:?} needs exactly one placeholder for the tag",
                args.branch_template
            )));
        }
        for target in args.target_repositories.values() {
            validate_all(&target.patches).map_err(|source| ConfigError::InvalidPatch {
                action: ActionKind::DistributeReleases,
                source,
            })?;
        }
        Ok(DistributeReleases {
            client,
            args,
            locks,
        })
    }

    async fn distribute_to(
        &self,
        repo: &str,
        target: &DistributeTarget,
        tag: &ReleaseTag,
    ) -> Result<(), ActionError> {
        let source = self.args.source_repository.as_str();
        let branch = render(&self.args.branch_template, &[tag.as_str()]);
        let message = render(&self.args.commit_message_template, &[source, tag.as_str()]);

        let mut lock = self.locks.acquire(repo).await;
        let pushed = patch_and_push(&self.client, repo, &branch, &message, &mut lock, |fs| {
            apply_all(&target.patches, fs, tag.as_str())
        })
        .await?;

        let pr = NewPullRequest {
            title: render(&self.args.pull_request_title_template, &[source, tag.as_str()]),
            head: branch.clone(),
            base: target.branch_base.clone(),
            body: None,
            draft: false,
        };
        match ensure_pull_request(&self.client, repo, &pr).await {
            Err(ActionError::GitHub(e)) if !pushed && e.is_no_commits_between() => {
                info!(repository = repo, branch = %branch, "already up to date");
                Ok(())
            }
            other => other,
        }
    }
}

impl WebhookHandler<ReleaseParams> for DistributeReleases {
    async fn handle(&self, params: ReleaseParams) -> Result<(), ActionError> {
        if params.source != self.args.source_repository {
            return Err(ActionError::skip(format!(
                "{} is not the source repository",
                params.source
            )));
        }
        let tag = ReleaseTag::parse(&params.tag).map_err(|e| ActionError::skip(e.to_string()))?;
        if tag.is_prerelease() {
            return Err(ActionError::skip(format!("{} is a pre-release", tag)));
        }

        let tag = &tag;
        let results = join_all(
            self.args
                .target_repositories
                .iter()
                .map(|(repo, target)| async move {
                    (repo, self.distribute_to(repo, target, tag).await)
                }),
        )
        .await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(repo, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(repository = %repo, error = %e, "distributing release failed");
                    Some(format!("{}: {}", repo, e))
                }
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ActionError::Targets(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::common::Origin;
    use crate::git::testing::Remotes;
    use crate::github::mock::{MockGitHub, pull_request_json};
    use axum::http::Method;

    const ARGS: &str = r#"
source-repository: metal-api
target-repositories:
  metal-python:
    patches:
      - type: line-replace
        args:
          file: metal_python/version.py
          line: 1
          replace-template: "VERSION = '%s'"
  metal-go:
    branch-base: main
    patches:
      - type: line-replace
        args:
          file: VERSION
          line: 1
"#;

    fn params(tag: &str) -> ReleaseParams {
        ReleaseParams {
            source: "metal-api".to_string(),
            tag: tag.to_string(),
            origin: Origin::GitHub,
        }
    }

    async fn setup(remotes: &Remotes, mock: &MockGitHub) -> DistributeReleases {
        for repo in ["metal-python", "metal-go"] {
            mock.on(
                Method::POST,
                &format!("/repos/metal-stack/{}/pulls", repo),
                201,
                pull_request_json(1, "Bump", "auto-generate/v0.15.1", "master"),
            );
        }
        let client = mock
            .client("metal-stack")
            .await
            .with_local_remotes(remotes.path());
        let args: DistributeArgs = serde_yaml::from_str(ARGS).unwrap();
        DistributeReleases::new(client, args, MultiLock::new()).unwrap()
    }

    #[tokio::test]
    async fn distributes_to_every_target() {
        let remotes = Remotes::new();
        remotes.create(
            "metal-python",
            &[("metal_python/version.py", "VERSION = 'v0.15.0'\n")],
            &[],
        );
        remotes.create("metal-go", &[("VERSION", "v0.15.0\n")], &["main"]);
        let mock = MockGitHub::new();
        let action = setup(&remotes, &mock).await;

        action.handle(params("v0.15.1")).await.unwrap();

        assert_eq!(
            remotes.show("metal-python", "auto-generate/v0.15.1", "metal_python/version.py"),
            "VERSION = 'v0.15.1'"
        );
        assert_eq!(
            remotes.subject("metal-python", "auto-generate/v0.15.1"),
            "Bump metal-api to version v0.15.1"
        );
        assert_eq!(remotes.show("metal-go", "auto-generate/v0.15.1", "VERSION"), "v0.15.1");

        let python = mock.requests_to(Method::POST, "/repos/metal-stack/metal-python/pulls");
        assert_eq!(python.len(), 1);
        assert_eq!(python[0].body["title"], "Bump metal-api to version v0.15.1");
        assert_eq!(python[0].body["head"], "auto-generate/v0.15.1");
        assert_eq!(python[0].body["base"], "master");

        let go = mock.requests_to(Method::POST, "/repos/metal-stack/metal-go/pulls");
        assert_eq!(go[0].body["base"], "main");
    }

    #[tokio::test]
    async fn failing_target_does_not_cancel_others() {
        let remotes = Remotes::new();
        remotes.create(
            "metal-python",
            &[("metal_python/version.py", "VERSION = 'v0.15.0'\n")],
            &[],
        );
        // metal-go has no VERSION file.
        remotes.create("metal-go", &[("README.md", "# metal-go\n")], &["main"]);
        let mock = MockGitHub::new();
        let action = setup(&remotes, &mock).await;

        let err = action.handle(params("v0.15.1")).await.unwrap_err();

        let ActionError::Targets(failures) = err else {
            panic!("expected target failures, got {err:?}");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("metal-go: "));
        assert_eq!(
            remotes.show("metal-python", "auto-generate/v0.15.1", "metal_python/version.py"),
            "VERSION = 'v0.15.1'"
        );
        assert!(!remotes.has_ref("metal-go", "refs/heads/auto-generate/v0.15.1"));
    }

    #[tokio::test]
    async fn skips_other_sources_and_prereleases() {
        let remotes = Remotes::new();
        let mock = MockGitHub::new();
        let action = setup(&remotes, &mock).await;

        let other = ReleaseParams {
            source: "metalctl".to_string(),
            ..params("v0.15.1")
        };
        assert!(action.handle(other).await.unwrap_err().is_skip());
        assert!(action.handle(params("v0.16.0-rc.1")).await.unwrap_err().is_skip());
        assert!(action.handle(params("0.16.0")).await.unwrap_err().is_skip());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn branch_template_needs_a_placeholder() {
        let raw = "source-repository: metal-api\nbranch-template: auto-generate";
        let args: DistributeArgs = serde_yaml::from_str(raw).unwrap();
        let client = MockGitHub::new().client("metal-stack").await;
        assert!(DistributeReleases::new(client, args, MultiLock::new()).is_err());
    }
}
