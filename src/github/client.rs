//! Octocrab client wrapper scoped to an organization.
//!
//! `GitHubClient` authenticates as a GitHub App installation of one
//! organization. All repository arguments are repository names within that
//! organization.

use std::fmt;
use std::path::PathBuf;

use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::git::RemoteUrl;

use super::error::GitHubApiError;
use super::models::{
    InstallationToken, IssueComment, NewPullRequest, NewTeam, PermissionLevel, PullRequest,
    PullRequestFilter, Release, ReleaseRequest, Team, TeamPermission,
};

const PER_PAGE: usize = 100;

/// Where git credentials come from.
#[derive(Clone)]
enum TokenSource {
    /// Mint a fresh installation token per request.
    App {
        app: Octocrab,
        installation: InstallationId,
    },
    /// A fixed token.
    Static(String),
}

/// A GitHub API client scoped to an organization.
#[derive(Clone)]
pub struct GitHubClient {
    organization: String,
    api: Octocrab,
    tokens: TokenSource,
    /// Directory of bare repositories used instead of github.com for git.
    local_remotes: Option<PathBuf>,
}

#[derive(Serialize)]
struct Page<'a, F: Serialize> {
    #[serde(flatten)]
    filter: &'a F,
    per_page: usize,
    page: u32,
}

impl GitHubClient {
    /// Authenticates as the GitHub App and looks up its installation in
    /// `organization`.
    pub async fn new_app(
        organization: impl Into<String>,
        app_id: u64,
        private_key_pem: &[u8],
    ) -> Result<Self, GitHubApiError> {
        let organization = organization.into();
        let key = EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| {
            GitHubApiError::without_source(format!("invalid GitHub App private key: {}", e))
        })?;

        let app = Octocrab::builder().app(AppId(app_id), key).build()?;
        let installation = app.apps().get_org_installation(&organization).await?;
        let api = app.installation(installation.id)?;

        debug!(
            organization = %organization,
            installation_id = installation.id.into_inner(),
            "authenticated as GitHub App installation"
        );

        Ok(Self {
            organization,
            api,
            tokens: TokenSource::App {
                app,
                installation: installation.id,
            },
            local_remotes: None,
        })
    }

    /// Creates a client from a pre-configured Octocrab instance and a fixed
    /// git token.
    pub fn with_token(
        organization: impl Into<String>,
        api: Octocrab,
        token: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            api,
            tokens: TokenSource::Static(token.into()),
            local_remotes: None,
        }
    }

    /// Resolves git remotes to `<dir>/<repo>.git` instead of github.com.
    #[cfg(test)]
    pub(crate) fn with_local_remotes(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_remotes = Some(dir.into());
        self
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.api
    }

    // ─── Credentials ──────────────────────────────────────────────────────

    /// Mints a short-lived installation token.
    pub async fn installation_token(&self) -> Result<String, GitHubApiError> {
        match &self.tokens {
            TokenSource::App { app, installation } => {
                let route = format!(
                    "/app/installations/{}/access_tokens",
                    installation.into_inner()
                );
                let token: InstallationToken = app.post(route, None::<&()>).await?;
                Ok(token.token)
            }
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }

    /// An authenticated clone URL for `repo` in the organization.
    pub async fn remote_url(&self, repo: &str) -> Result<RemoteUrl, GitHubApiError> {
        if let Some(dir) = &self.local_remotes {
            let path = dir.join(format!("{}.git", repo));
            return Ok(RemoteUrl::new(path.to_string_lossy()));
        }
        let token = self.installation_token().await?;
        Ok(RemoteUrl::github(&self.organization, repo, &token))
    }

    /// A clone URL for a repository outside the organization, such as the
    /// head repository of a fork. `full_name` is `<owner>/<repo>`.
    pub fn public_remote_url(&self, full_name: &str) -> RemoteUrl {
        if let Some(dir) = &self.local_remotes {
            let path = dir.join(format!("{}.git", full_name.replace('/', "__")));
            return RemoteUrl::new(path.to_string_lossy());
        }
        RemoteUrl::new(format!("https://github.com/{}.git", full_name))
    }

    // ─── Pull Requests ────────────────────────────────────────────────────

    pub async fn list_pull_requests(
        &self,
        repo: &str,
        filter: &PullRequestFilter,
    ) -> Result<Vec<PullRequest>, GitHubApiError> {
        let route = format!("/repos/{}/{}/pulls", self.organization, repo);
        self.get_all(&route, filter).await
    }

    pub async fn get_pull_request(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, GitHubApiError> {
        let route = format!("/repos/{}/{}/pulls/{}", self.organization, repo, number);
        Ok(self.api.get(route, None::<&()>).await?)
    }

    pub async fn create_pull_request(
        &self,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, GitHubApiError> {
        let route = format!("/repos/{}/{}/pulls", self.organization, repo);
        Ok(self.api.post(route, Some(pr)).await?)
    }

    /// Sets a pull request's state (`open` or `closed`).
    pub async fn edit_pull_request_state(
        &self,
        repo: &str,
        number: u64,
        state: &str,
    ) -> Result<PullRequest, GitHubApiError> {
        let route = format!("/repos/{}/{}/pulls/{}", self.organization, repo, number);
        let body = serde_json::json!({ "state": state });
        Ok(self.api.patch(route, Some(&body)).await?)
    }

    // ─── Comments ─────────────────────────────────────────────────────────

    pub async fn create_issue_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<IssueComment, GitHubApiError> {
        let route = format!(
            "/repos/{}/{}/issues/{}/comments",
            self.organization, repo, number
        );
        let body = serde_json::json!({ "body": body });
        Ok(self.api.post(route, Some(&body)).await?)
    }

    /// Lists all comments of an issue or pull request, newest first.
    pub async fn list_issue_comments_desc(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<IssueComment>, GitHubApiError> {
        let route = format!(
            "/repos/{}/{}/issues/{}/comments",
            self.organization, repo, number
        );
        let mut comments: Vec<IssueComment> = self.get_all(&route, &()).await?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    /// Adds a reaction (`+1`, `rocket`, `eyes`, ...) to an issue comment.
    pub async fn add_issue_comment_reaction(
        &self,
        repo: &str,
        comment_id: u64,
        content: &str,
    ) -> Result<(), GitHubApiError> {
        let route = format!(
            "/repos/{}/{}/issues/comments/{}/reactions",
            self.organization, repo, comment_id
        );
        let body = serde_json::json!({ "content": content });
        let _: serde_json::Value = self.api.post(route, Some(&body)).await?;
        Ok(())
    }

    // ─── Releases ─────────────────────────────────────────────────────────

    pub async fn list_releases(&self, repo: &str) -> Result<Vec<Release>, GitHubApiError> {
        let route = format!("/repos/{}/{}/releases", self.organization, repo);
        self.get_all(&route, &()).await
    }

    /// The latest published, non-prerelease release, if any.
    pub async fn latest_release(&self, repo: &str) -> Result<Option<Release>, GitHubApiError> {
        let route = format!("/repos/{}/{}/releases/latest", self.organization, repo);
        match self.api.get(route, None::<&()>).await {
            Ok(release) => Ok(Some(release)),
            Err(e) => {
                let err = GitHubApiError::from_octocrab(e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }

    pub async fn create_release(
        &self,
        repo: &str,
        release: &ReleaseRequest,
    ) -> Result<Release, GitHubApiError> {
        let route = format!("/repos/{}/{}/releases", self.organization, repo);
        Ok(self.api.post(route, Some(release)).await?)
    }

    pub async fn edit_release(
        &self,
        repo: &str,
        id: u64,
        release: &ReleaseRequest,
    ) -> Result<Release, GitHubApiError> {
        let route = format!("/repos/{}/{}/releases/{}", self.organization, repo, id);
        Ok(self.api.patch(route, Some(release)).await?)
    }

    // ─── Teams & Permissions ──────────────────────────────────────────────

    pub async fn create_team(&self, team: &NewTeam) -> Result<Team, GitHubApiError> {
        let route = format!("/orgs/{}/teams", self.organization);
        Ok(self.api.post(route, Some(team)).await?)
    }

    /// Grants `team_slug` access to `repo`.
    pub async fn add_team_repository(
        &self,
        team_slug: &str,
        repo: &str,
        permission: TeamPermission,
    ) -> Result<(), GitHubApiError> {
        self.api
            .teams(&self.organization)
            .repos(team_slug)
            .add_or_update(&self.organization, repo, permission.to_octocrab())
            .await?;
        Ok(())
    }

    /// The permission level (`admin`, `write`, `read`, `none`) of `user` on
    /// `repo`.
    pub async fn user_permission(&self, repo: &str, user: &str) -> Result<String, GitHubApiError> {
        let route = format!(
            "/repos/{}/{}/collaborators/{}/permission",
            self.organization, repo, user
        );
        let level: PermissionLevel = self.api.get(route, None::<&()>).await?;
        Ok(level.permission)
    }

    // ─── Helpers ──────────────────────────────────────────────────────────

    /// Follows page numbers until a short page is returned.
    async fn get_all<T, F>(&self, route: &str, filter: &F) -> Result<Vec<T>, GitHubApiError>
    where
        T: DeserializeOwned,
        F: Serialize,
    {
        let mut page = 1u32;
        let mut all = Vec::new();

        loop {
            let params = Page {
                filter,
                per_page: PER_PAGE,
                page,
            };
            let items: Vec<T> = self.api.get(route, Some(&params)).await?;
            let is_last_page = items.len() < PER_PAGE;
            all.extend(items);

            if is_last_page {
                break;
            }
            page += 1;
        }

        Ok(all)
    }
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("organization", &self.organization)
            .finish_non_exhaustive()
    }
}
