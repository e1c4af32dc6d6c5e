//! A canned GitHub API served by axum, for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use octocrab::Octocrab;

use super::GitHubClient;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: serde_json::Value,
}

type Routes = HashMap<(Method, String), Vec<(StatusCode, serde_json::Value)>>;

#[derive(Default)]
struct Inner {
    routes: Mutex<Routes>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Answers requests from registered responses keyed by method and path.
///
/// Several responses for the same key are served in order; the last one is
/// repeated. Unknown routes get a GitHub-style 404.
#[derive(Clone, Default)]
pub(crate) struct MockGitHub {
    inner: Arc<Inner>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, status: u16, body: serde_json::Value) -> &Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.inner
            .routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push((status, body));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// Requests matching a method and path.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Serves the mock on an ephemeral port and returns a client for
    /// organization `org` pointed at it.
    pub async fn client(&self, org: &str) -> GitHubClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let octocrab = Octocrab::builder()
            .base_uri(format!("http://{}", addr))
            .unwrap()
            .personal_token("test-token".to_string())
            .build()
            .unwrap();
        GitHubClient::with_token(org, octocrab, "test-token")
    }
}

async fn handle(State(mock): State<MockGitHub>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    mock.inner.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        body,
    });

    let mut routes = mock.inner.routes.lock().unwrap();
    match routes.get_mut(&(method, path)) {
        Some(responses) if !responses.is_empty() => {
            let (status, body) = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            if status == StatusCode::NO_CONTENT {
                status.into_response()
            } else {
                (status, axum::Json(body)).into_response()
            }
        }
        _ => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

/// A minimal pull request payload.
pub(crate) fn pull_request_json(
    number: u64,
    title: &str,
    head: &str,
    base: &str,
) -> serde_json::Value {
    serde_json::json!({
        "number": number,
        "node_id": format!("PR_{}", number),
        "title": title,
        "state": "open",
        "body": null,
        "html_url": null,
        "user": {"login": "metal-robot[bot]"},
        "head": {"ref": head, "sha": "a".repeat(40), "repo": null},
        "base": {"ref": base, "sha": "b".repeat(40), "repo": null},
    })
}

/// A minimal issue comment payload.
pub(crate) fn comment_json(id: u64, body: &str, created_at: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "body": body,
        "user": {"login": "someone"},
        "created_at": created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::models::{NewPullRequest, PullRequestFilter, TeamPermission};

    #[tokio::test]
    async fn lists_and_creates_pull_requests() {
        let mock = MockGitHub::new();
        mock.on(
            Method::GET,
            "/repos/metal-stack/releases/pulls",
            200,
            serde_json::json!([pull_request_json(1, "Next release", "develop", "master")]),
        );
        mock.on(
            Method::POST,
            "/repos/metal-stack/releases/pulls",
            201,
            pull_request_json(2, "Next release", "develop", "master"),
        );
        let client = mock.client("metal-stack").await;

        let prs = client
            .list_pull_requests(
                "releases",
                &PullRequestFilter {
                    state: Some("open".to_string()),
                    head: Some("metal-stack:develop".to_string()),
                    base: Some("master".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(prs.len(), 1);

        let request = &mock.requests_to(Method::GET, "/repos/metal-stack/releases/pulls")[0];
        assert!(request.query.contains("state=open"));
        assert!(request.query.contains("head=metal-stack%3Adevelop"));
        assert!(request.query.contains("per_page=100"));

        let created = client
            .create_pull_request(
                "releases",
                &NewPullRequest {
                    title: "Next release".to_string(),
                    head: "develop".to_string(),
                    base: "master".to_string(),
                    body: None,
                    draft: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.number, 2);
    }

    #[tokio::test]
    async fn duplicate_pull_request_is_recognised() {
        let mock = MockGitHub::new();
        mock.on(
            Method::POST,
            "/repos/metal-stack/releases/pulls",
            422,
            serde_json::json!({
                "message": "Validation Failed",
                "errors": [{"resource": "PullRequest", "code": "custom", "message": "A pull request already exists for metal-stack:develop."}],
            }),
        );
        let client = mock.client("metal-stack").await;

        let err = client
            .create_pull_request(
                "releases",
                &NewPullRequest {
                    title: "Next release".to_string(),
                    head: "develop".to_string(),
                    base: "master".to_string(),
                    body: None,
                    draft: false,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(err.status_code, Some(422));
    }

    #[tokio::test]
    async fn comments_are_sorted_newest_first() {
        let mock = MockGitHub::new();
        mock.on(
            Method::GET,
            "/repos/metal-stack/releases/issues/5/comments",
            200,
            serde_json::json!([
                comment_json(1, "/freeze", "2024-01-01T10:00:00Z"),
                comment_json(2, "/unfreeze", "2024-01-02T10:00:00Z"),
            ]),
        );
        let client = mock.client("metal-stack").await;

        let comments = client.list_issue_comments_desc("releases", 5).await.unwrap();
        let ids: Vec<u64> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn missing_latest_release_is_none() {
        let mock = MockGitHub::new();
        let client = mock.client("metal-stack").await;
        assert!(client.latest_release("releases").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grants_team_permission() {
        let mock = MockGitHub::new();
        mock.on(
            Method::PUT,
            "/orgs/metal-stack/teams/new-repo-maintainers/repos/metal-stack/new-repo",
            204,
            serde_json::Value::Null,
        );
        let client = mock.client("metal-stack").await;

        client
            .add_team_repository("new-repo-maintainers", "new-repo", TeamPermission::Maintain)
            .await
            .unwrap();

        let request = &mock.requests_to(
            Method::PUT,
            "/orgs/metal-stack/teams/new-repo-maintainers/repos/metal-stack/new-repo",
        )[0];
        assert_eq!(request.body["permission"], "maintain");
    }

    #[tokio::test]
    async fn graphql_errors_surface() {
        let mock = MockGitHub::new();
        mock.on(
            Method::POST,
            "/graphql",
            200,
            serde_json::json!({"data": null, "errors": [{"message": "Could not resolve to a node"}]}),
        );
        let client = mock.client("metal-stack").await;

        let err = client.content_labels("I_1").await.unwrap_err();
        assert!(err.message.contains("Could not resolve to a node"));
    }
}
