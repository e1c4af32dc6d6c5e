//! Request and response bodies for the REST endpoints the bot uses.
//!
//! Only the fields the actions read are modelled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub fork: bool,
    pub owner: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    /// `None` when the source repository of a fork was deleted.
    pub repo: Option<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub node_id: String,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub body: Option<String>,
    pub html_url: Option<String>,
    pub user: Option<User>,
    pub head: BranchRef,
    pub base: BranchRef,
}

impl PullRequest {
    /// Whether the head branch lives in a different repository than the base.
    pub fn is_from_fork(&self) -> bool {
        match (&self.head.repo, &self.base.repo) {
            (Some(head), Some(base)) => head.full_name != base.full_name,
            (None, _) => true,
            _ => false,
        }
    }
}

/// Filter for listing pull requests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PullRequestFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// `<owner>:<branch>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub body: Option<String>,
    pub user: Option<User>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// Body for creating or editing a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRequest {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTeam {
    pub name: String,
    pub maintainers: Vec<String>,
    /// `<org>/<repo>` entries.
    pub repo_names: Vec<String>,
    pub privacy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub id: u64,
    pub slug: String,
    pub name: String,
}

/// Repository permission granted to a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamPermission {
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
}

impl TeamPermission {
    pub(crate) fn to_octocrab(self) -> octocrab::params::teams::Permission {
        use octocrab::params::teams::Permission;
        match self {
            TeamPermission::Pull => Permission::Pull,
            TeamPermission::Triage => Permission::Triage,
            TeamPermission::Push => Permission::Push,
            TeamPermission::Maintain => Permission::Maintain,
            TeamPermission::Admin => Permission::Admin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstallationToken {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PermissionLevel {
    pub permission: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_request(head_repo: Option<&str>) -> PullRequest {
        let repo = |full_name: &str| Repository {
            name: full_name.rsplit('/').next().unwrap_or_default().to_string(),
            full_name: full_name.to_string(),
            fork: false,
            owner: User {
                login: full_name.split('/').next().unwrap_or_default().to_string(),
            },
        };
        PullRequest {
            number: 7,
            node_id: "PR_kwDO".to_string(),
            title: "Fix typo".to_string(),
            state: "open".to_string(),
            draft: false,
            body: None,
            html_url: None,
            user: Some(User {
                login: "alice".to_string(),
            }),
            head: BranchRef {
                ref_name: "fix".to_string(),
                sha: "a".repeat(40),
                repo: head_repo.map(repo),
            },
            base: BranchRef {
                ref_name: "master".to_string(),
                sha: "b".repeat(40),
                repo: Some(repo("metal-stack/docs")),
            },
        }
    }

    #[test]
    fn fork_detection() {
        assert!(!pull_request(Some("metal-stack/docs")).is_from_fork());
        assert!(pull_request(Some("alice/docs")).is_from_fork());
        assert!(pull_request(None).is_from_fork());
    }

    #[test]
    fn filter_omits_unset_fields() {
        let filter = PullRequestFilter {
            state: Some("open".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            serde_json::json!({"state": "open"})
        );
    }

    #[test]
    fn decodes_pull_request() {
        let json = serde_json::json!({
            "number": 42,
            "node_id": "PR_1",
            "title": "Next release",
            "state": "open",
            "body": null,
            "html_url": "https://github.com/metal-stack/releases/pull/42",
            "user": {"login": "metal-robot[bot]"},
            "head": {"ref": "develop", "sha": "abc", "repo": {"name": "releases", "full_name": "metal-stack/releases", "owner": {"login": "metal-stack"}}},
            "base": {"ref": "master", "sha": "def", "repo": {"name": "releases", "full_name": "metal-stack/releases", "owner": {"login": "metal-stack"}}}
        });
        let pr: PullRequest = serde_json::from_value(json).unwrap();
        assert_eq!(pr.head.ref_name, "develop");
        assert!(!pr.draft);
        assert!(!pr.is_from_fork());
    }
}
