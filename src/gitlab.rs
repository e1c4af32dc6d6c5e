//! GitLab client.
//!
//! GitLab only ever acts as an event source: tag pushes on GitLab projects
//! trigger actions that write to GitHub. The client holds the access token,
//! which is needed to read from GitLab-hosted source repositories.

use std::fmt;

use crate::git::RemoteUrl;

/// Credentials for a GitLab instance.
#[derive(Clone)]
pub struct GitLabClient {
    organization: String,
    token: String,
}

impl GitLabClient {
    pub fn new(organization: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            token: token.into(),
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// An authenticated clone URL for a project on gitlab.com.
    pub fn remote_url(&self, project_path: &str) -> RemoteUrl {
        RemoteUrl::new(format!(
            "https://oauth2:{}@gitlab.com/{}.git",
            self.token, project_path
        ))
    }
}

impl fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitLabClient")
            .field("organization", &self.organization)
            .finish_non_exhaustive()
    }
}
