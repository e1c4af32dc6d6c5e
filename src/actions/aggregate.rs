//! `aggregate-releases`: pins component releases in a release vector.
//!
//! When a configured component publishes `v<semver>`, its patches are
//! applied to the release branch of the target repository and a release
//! pull request is kept open against the base branch. A `/freeze` on that
//! pull request stops further bumps until `/unfreeze`.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::info;

use crate::config::{ActionKind, ConfigError};
use crate::dispatch::MultiLock;
use crate::github::GitHubClient;
use crate::patch::{PatchSpec, apply_all, validate_all};
use crate::template::render;
use crate::types::ReleaseTag;

use super::common::{
    ReleaseParams, ReleasePullRequest, default_base_branch, default_bump_template,
    default_release_branch, default_release_pr_title, patch_and_push,
};
use super::{ActionError, WebhookHandler};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AggregateArgs {
    pub repository: String,
    #[serde(default = "default_release_branch")]
    pub branch: String,
    #[serde(default = "default_base_branch")]
    pub branch_base: String,
    #[serde(default = "default_release_pr_title")]
    pub pull_request_title: String,
    #[serde(default = "default_bump_template")]
    pub commit_message_template: String,
    /// Component repository name to the patches pinning its version.
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<PatchSpec>>,
}

impl AggregateArgs {
    pub(crate) fn validate(&self, kind: ActionKind) -> Result<(), ConfigError> {
        for patches in self.sources.values() {
            validate_all(patches).map_err(|source| ConfigError::InvalidPatch {
                action: kind,
                source,
            })?;
        }
        Ok(())
    }

    pub(crate) fn release_pull_request(&self) -> ReleasePullRequest<'_> {
        ReleasePullRequest {
            repository: &self.repository,
            branch: &self.branch,
            base: &self.branch_base,
            title: &self.pull_request_title,
        }
    }
}

#[derive(Debug)]
pub struct AggregateReleases {
    client: GitHubClient,
    args: AggregateArgs,
    locks: MultiLock,
}

impl AggregateReleases {
    pub fn new(
        client: GitHubClient,
        args: AggregateArgs,
        locks: MultiLock,
    ) -> Result<Self, ConfigError> {
        args.validate(ActionKind::AggregateReleases)?;
        Ok(AggregateReleases {
            client,
            args,
            locks,
        })
    }

    /// Pins `tag` of `source` in the target repository.
    ///
    /// With `respect_freeze` unset the freeze state of the release pull
    /// request is not consulted.
    pub async fn aggregate(
        &self,
        source: &str,
        tag: &str,
        respect_freeze: bool,
    ) -> Result<(), ActionError> {
        let Some(patches) = self.args.sources.get(source) else {
            return Err(ActionError::skip(format!(
                "{} is not a source of {}",
                source, self.args.repository
            )));
        };
        let tag = ReleaseTag::parse(tag).map_err(|e| ActionError::skip(e.to_string()))?;
        let release = self.args.release_pull_request();

        if respect_freeze
            && release
                .warn_if_frozen(&self.client, source, tag.as_str())
                .await?
        {
            return Ok(());
        }

        let mut lock = self.locks.acquire(&self.args.repository).await;
        let message = render(&self.args.commit_message_template, &[source, tag.as_str()]);
        let pushed = patch_and_push(
            &self.client,
            &self.args.repository,
            &self.args.branch,
            &message,
            &mut lock,
            |fs| apply_all(patches, fs, tag.as_str()),
        )
        .await?;

        if pushed {
            info!(
                repository = %self.args.repository,
                branch = %self.args.branch,
                source,
                tag = %tag,
                "aggregated release"
            );
        }
        release.ensure(&self.client).await
    }
}

impl WebhookHandler<ReleaseParams> for AggregateReleases {
    async fn handle(&self, params: ReleaseParams) -> Result<(), ActionError> {
        self.aggregate(&params.source, &params.tag, true).await
    }
}
