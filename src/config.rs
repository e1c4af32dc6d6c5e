//! Configuration file decoding.
//!
//! The configuration is read once at startup. It names the forge clients the
//! bot authenticates as and the webhook endpoints it serves, each with an
//! ordered list of actions.
//!
//! ```yaml
//! clients:
//!   - name: github-app
//!     organization: metal-stack
//!     github:
//!       app-id: 12345
//!       key-path: /etc/metal-robot/key.pem
//! webhooks:
//!   - vcs: github
//!     serve-path: /github/webhook
//!     secret: s3cret
//!     actions:
//!       - type: docs-preview-comment
//!         client: github-app
//!         args:
//!           comment-template: "Preview: https://docs.metal-stack.io/pr-%d/"
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::patch::PatchError;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid arguments for action {action}: {source}")]
    InvalidArgs {
        action: ActionKind,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid patch for action {action}: {source}")]
    InvalidPatch {
        action: ActionKind,
        #[source]
        source: PatchError,
    },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// A forge identity. Exactly one of `github` and `gitlab` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClientConfig {
    pub name: String,
    pub organization: String,
    pub github: Option<GitHubCredentials>,
    pub gitlab: Option<GitLabCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GitHubCredentials {
    pub app_id: u64,
    /// PEM encoded private key of the GitHub App.
    pub key_path: PathBuf,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GitLabCredentials {
    pub token: String,
}

impl fmt::Debug for GitLabCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitLabCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    Github,
    Gitlab,
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Vcs::Github => "github",
            Vcs::Gitlab => "gitlab",
        })
    }
}

/// One HTTP endpoint receiving webhooks from a forge.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WebhookConfig {
    pub vcs: Vcs,
    pub serve_path: String,
    pub secret: String,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("vcs", &self.vcs)
            .field("serve_path", &self.serve_path)
            .field("secret", &"<redacted>")
            .field("actions", &self.actions)
            .finish()
    }
}

/// The catalog of actions that can be configured on a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    AggregateReleases,
    DistributeReleases,
    YamlTranslateReleases,
    ReleaseDrafter,
    RepositoryMaintainers,
    DocsPreviewComment,
    IssueCommentHandler,
    ProjectItemAdd,
    #[serde(rename = "project-v2-item")]
    ProjectV2Item,
    LabelsOnCreation,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::AggregateReleases => "aggregate-releases",
            ActionKind::DistributeReleases => "distribute-releases",
            ActionKind::YamlTranslateReleases => "yaml-translate-releases",
            ActionKind::ReleaseDrafter => "release-drafter",
            ActionKind::RepositoryMaintainers => "repository-maintainers",
            ActionKind::DocsPreviewComment => "docs-preview-comment",
            ActionKind::IssueCommentHandler => "issue-comment-handler",
            ActionKind::ProjectItemAdd => "project-item-add",
            ActionKind::ProjectV2Item => "project-v2-item",
            ActionKind::LabelsOnCreation => "labels-on-creation",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub client: String,
    #[serde(default)]
    pub args: serde_yaml::Value,
}

impl ActionSpec {
    /// Decodes the free-form `args` mapping into an action's typed arguments.
    ///
    /// A missing `args` key decodes like an empty mapping.
    pub fn decode_args<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let args = match &self.args {
            serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
            other => other.clone(),
        };
        serde_yaml::from_value(args).map_err(|source| ConfigError::InvalidArgs {
            action: self.kind,
            source,
        })
    }
}

impl Config {
    /// Reads, decodes and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn client(&self, name: &str) -> Option<&ClientConfig> {
        self.clients.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for client in &self.clients {
            if !names.insert(client.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate client name {:?}",
                    client.name
                )));
            }
            match (&client.github, &client.gitlab) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "client {:?} needs exactly one of github and gitlab",
                        client.name
                    )));
                }
            }
        }

        let mut paths = HashSet::new();
        for webhook in &self.webhooks {
            if !webhook.serve_path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "serve-path {:?} must start with '/'",
                    webhook.serve_path
                )));
            }
            if webhook.serve_path == "/health" || !paths.insert(webhook.serve_path.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "serve-path {:?} is already in use",
                    webhook.serve_path
                )));
            }
            for action in &webhook.actions {
                if self.client(&action.client).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "action {} references unknown client {:?}",
                        action.kind, action.client
                    )));
                }
            }
        }
        Ok(())
    }
}
