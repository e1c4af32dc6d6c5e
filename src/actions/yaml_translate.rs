//! `yaml-translate-releases`: aggregation with values taken from the source.
//!
//! Instead of writing the released tag itself, each translation reads a value
//! from a YAML file of the source repository at the released tag and writes
//! it into the target through its patches. Freeze gating works as for
//! `aggregate-releases`.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{ActionKind, ConfigError};
use crate::dispatch::MultiLock;
use crate::git::WorkingCopy;
use crate::github::GitHubClient;
use crate::gitlab::GitLabClient;
use crate::patch::{PatchSpec, apply_all, read_yaml_value, validate_all};
use crate::template::render;
use crate::types::ReleaseTag;

use super::common::{
    Origin, ReleaseParams, ReleasePullRequest, default_base_branch, default_bump_template,
    default_release_branch, default_release_pr_title, patch_and_push,
};
use super::{ActionError, WebhookHandler};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct YamlTranslateArgs {
    pub repository: String,
    #[serde(default = "default_release_branch")]
    pub branch: String,
    #[serde(default = "default_base_branch")]
    pub branch_base: String,
    #[serde(default = "default_release_pr_title")]
    pub pull_request_title: String,
    #[serde(default = "default_bump_template")]
    pub commit_message_template: String,
    /// GitLab client used to read sources released on GitLab.
    pub source_client: Option<String>,
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<Translation>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Translation {
    pub from: YamlSource,
    pub to: Vec<PatchSpec>,
}

/// A value in a YAML file of the source repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct YamlSource {
    pub file: String,
    pub yaml_path: String,
}

#[derive(Debug)]
pub struct YamlTranslateReleases {
    client: GitHubClient,
    gitlab: Option<GitLabClient>,
    args: YamlTranslateArgs,
    locks: MultiLock,
}

impl YamlTranslateReleases {
    pub fn new(
        client: GitHubClient,
        gitlab: Option<GitLabClient>,
        args: YamlTranslateArgs,
        locks: MultiLock,
    ) -> Result<Self, ConfigError> {
        for translations in args.sources.values() {
            for translation in translations {
                validate_all(&translation.to).map_err(|source| ConfigError::InvalidPatch {
                    action: ActionKind::YamlTranslateReleases,
                    source,
                })?;
            }
        }
        Ok(YamlTranslateReleases {
            client,
            gitlab,
            args,
            locks,
        })
    }

    /// Reads every translation's value from the source at `tag`.
    async fn read_values(
        &self,
        params: &ReleaseParams,
        tag: &ReleaseTag,
        translations: &[Translation],
    ) -> Result<Vec<String>, ActionError> {
        let remote = match &params.origin {
            Origin::GitHub => self.client.remote_url(&params.source).await?,
            Origin::GitLab { project_path } => match &self.gitlab {
                Some(gitlab) => gitlab.remote_url(project_path),
                None => {
                    return Err(ActionError::skip(format!(
                        "no source-client configured to read {} from GitLab",
                        project_path
                    )));
                }
            },
        };

        let source = WorkingCopy::clone_at_ref(&remote, tag.as_str()).await?;
        let values = translations
            .iter()
            .map(|t| read_yaml_value(&source, &t.from.file, &t.from.yaml_path))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(source = %params.source, tag = %tag, ?values, "read translated values");
        Ok(values)
    }
}

impl WebhookHandler<ReleaseParams> for YamlTranslateReleases {
    async fn handle(&self, params: ReleaseParams) -> Result<(), ActionError> {
        let Some(translations) = self.args.sources.get(&params.source) else {
            return Err(ActionError::skip(format!(
                "{} is not a source of {}",
                params.source, self.args.repository
            )));
        };
        let tag = ReleaseTag::parse(&params.tag).map_err(|e| ActionError::skip(e.to_string()))?;
        let release = ReleasePullRequest {
            repository: &self.args.repository,
            branch: &self.args.branch,
            base: &self.args.branch_base,
            title: &self.args.pull_request_title,
        };

        if release
            .warn_if_frozen(&self.client, &params.source, tag.as_str())
            .await?
        {
            return Ok(());
        }

        let values = self.read_values(&params, &tag, translations).await?;

        let mut lock = self.locks.acquire(&self.args.repository).await;
        let message = render(
            &self.args.commit_message_template,
            &[&params.source, tag.as_str()],
        );
        let pushed = patch_and_push(
            &self.client,
            &self.args.repository,
            &self.args.branch,
            &message,
            &mut lock,
            |fs| {
                translations
                    .iter()
                    .zip(&values)
                    .try_for_each(|(t, value)| apply_all(&t.to, fs, value))
            },
        )
        .await?;

        if pushed {
            info!(
                repository = %self.args.repository,
                source = %params.source,
                tag = %tag,
                "translated release"
            );
        }
        release.ensure(&self.client).await
    }
}
