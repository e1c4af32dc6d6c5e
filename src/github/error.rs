//! GitHub API error types.
//!
//! The adapter performs no retries. Callers get the HTTP status and GitHub's
//! own message, and interpret the few conditions they care about through the
//! predicates on [`GitHubApiError`].

use std::fmt;
use thiserror::Error;

/// Messages GitHub returns when the resource being created already exists.
const ALREADY_EXISTS_MESSAGES: &[&str] = &[
    "A pull request already exists",
    "Name must be unique for this org",
];

/// A GitHub API error.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// GitHub's message, including the detail of any validation errors.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates an error without an octocrab source.
    pub fn without_source(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Converts an octocrab error, flattening GitHub's validation errors into
    /// the message so that they can be matched on.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let (status_code, message) = match &err {
            octocrab::Error::GitHub { source, .. } => {
                let mut message = source.message.clone();
                for detail in source.errors.iter().flatten() {
                    let text = detail
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| detail.to_string());
                    message.push_str("; ");
                    message.push_str(&text);
                }
                (Some(source.status_code.as_u16()), message)
            }
            other => (None, other.to_string()),
        };

        Self {
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Whether the request failed because the resource already exists
    /// (an open pull request for the same head and base, or a team name).
    pub fn is_already_exists(&self) -> bool {
        ALREADY_EXISTS_MESSAGES
            .iter()
            .any(|m| self.message.contains(m))
    }

    /// Whether a pull request could not be opened because head and base
    /// point at the same commit.
    pub fn is_no_commits_between(&self) -> bool {
        self.message.contains("No commits between")
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

impl From<octocrab::Error> for GitHubApiError {
    fn from(err: octocrab::Error) -> Self {
        Self::from_octocrab(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(status: Option<u16>, message: &str) -> GitHubApiError {
        GitHubApiError {
            status_code: status,
            message: message.to_string(),
            source: None,
        }
    }

    #[test]
    fn already_exists_detection() {
        assert!(
            error(
                Some(422),
                "Validation Failed; A pull request already exists for metal-stack:develop."
            )
            .is_already_exists()
        );
        assert!(
            error(Some(422), "Validation Failed; Name must be unique for this org")
                .is_already_exists()
        );
        assert!(!error(Some(422), "Validation Failed; No commits between master and develop").is_already_exists());
    }

    #[test]
    fn no_commits_detection() {
        let err = error(Some(422), "Validation Failed; No commits between master and auto-generate/v0.15.1");
        assert!(err.is_no_commits_between());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn not_found_detection() {
        assert!(error(Some(404), "Not Found").is_not_found());
        assert!(!error(None, "Not Found").is_not_found());
    }

    #[test]
    fn display_includes_status() {
        assert_eq!(
            error(Some(403), "Resource not accessible by integration").to_string(),
            "GitHub API error (HTTP 403): Resource not accessible by integration"
        );
        assert_eq!(
            GitHubApiError::without_source("boom").to_string(),
            "GitHub API error: boom"
        );
    }
}
