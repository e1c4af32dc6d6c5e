//! HTTP server for metal-robot.
//!
//! Every configured webhook gets its own POST endpoint with its own secret
//! and handler registry. Deliveries are verified, parsed and handed to the
//! registry in a background task; the forge gets its response right away.
//!
//! # Endpoints
//!
//! - `POST <serve-path>` - one per configured webhook (GitHub or GitLab)
//! - `GET /health` - returns 200 if the server is running

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::config::Vcs;
use crate::dispatch::Registry;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, github_webhook_handler, gitlab_webhook_handler};

/// State of one webhook endpoint.
///
/// Passed to the handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    vcs: Vcs,

    /// HMAC key (GitHub) or expected token (GitLab).
    secret: String,

    registry: Arc<Registry>,
}

impl AppState {
    pub fn new(vcs: Vcs, secret: impl Into<String>, registry: Arc<Registry>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                vcs,
                secret: secret.into(),
                registry,
            }),
        }
    }

    pub fn vcs(&self) -> Vcs {
        self.inner.vcs
    }

    pub fn secret(&self) -> &str {
        &self.inner.secret
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }
}

/// Builds the router serving every webhook endpoint plus `/health`.
pub fn build_router(endpoints: impl IntoIterator<Item = (String, AppState)>) -> Router {
    let mut router = Router::new().route("/health", get(health_handler));

    for (path, state) in endpoints {
        let endpoint = match state.vcs() {
            Vcs::Github => post(github_webhook_handler).with_state(state),
            Vcs::Gitlab => post(gitlab_webhook_handler).with_state(state),
        };
        router = router.route(&path, endpoint);
    }

    router.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::webhooks::{ReleaseEvent, compute_signature, format_signature_header};

    const SECRET: &str = "test-secret";

    fn router(registry: Arc<Registry>) -> Router {
        build_router([
            (
                "/github".to_string(),
                AppState::new(Vcs::Github, SECRET, Arc::clone(&registry)),
            ),
            (
                "/gitlab".to_string(),
                AppState::new(Vcs::Gitlab, SECRET, registry),
            ),
        ])
    }

    fn github_request(event_type: &str, secret: &str, body: &serde_json::Value) -> Request<Body> {
        let body = serde_json::to_vec(body).unwrap();
        let signature = format_signature_header(&compute_signature(&body, secret.as_bytes()));
        Request::builder()
            .method("POST")
            .uri("/github")
            .header("content-type", "application/json")
            .header("x-github-event", event_type)
            .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body))
            .unwrap()
    }

    fn release_payload() -> serde_json::Value {
        serde_json::json!({
            "action": "published",
            "release": {"tag_name": "v0.8.1", "body": "", "draft": false, "prerelease": false},
            "repository": {"owner": {"login": "metal-stack"}, "name": "metalctl"},
            "sender": {"login": "alice"}
        })
    }

    async fn body_of(response: axum::response::Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    // ─── Health endpoint tests ───

    #[tokio::test]
    async fn health_returns_200() {
        let app = router(Arc::new(Registry::new()));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, b"OK");
    }

    // ─── GitHub endpoint tests ───

    #[tokio::test]
    async fn valid_delivery_runs_handlers() {
        let registry = Arc::new(Registry::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        registry
            .register("record", move |event: Arc<ReleaseEvent>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(event.tag.clone());
                    Ok(())
                }
            })
            .await;
        let app = router(registry);

        let response = app
            .oneshot(github_request("release", SECRET, &release_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_of(response).await.is_empty());
        assert_eq!(rx.recv().await.as_deref(), Some("v0.8.1"));
    }

    #[tokio::test]
    async fn invalid_signature_returns_500() {
        let app = router(Arc::new(Registry::new()));

        let response = app
            .oneshot(github_request("release", "wrong-secret", &release_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_returns_500() {
        let app = router(Arc::new(Registry::new()));

        let response = app
            .oneshot(github_request("release", SECRET, &serde_json::json!({"action": "published"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unknown_event_is_acknowledged() {
        let app = router(Arc::new(Registry::new()));

        let response = app
            .oneshot(github_request("star", SECRET, &serde_json::json!({"action": "created"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_event_header_returns_500() {
        let app = router(Arc::new(Registry::new()));
        let body = serde_json::to_vec(&release_payload()).unwrap();
        let signature = format_signature_header(&compute_signature(&body, SECRET.as_bytes()));
        let request = Request::builder()
            .method("POST")
            .uri("/github")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ─── GitLab endpoint tests ───

    fn gitlab_request(token: &str) -> Request<Body> {
        let body = serde_json::json!({
            "object_kind": "tag_push",
            "ref": "refs/tags/v1.2.0",
            "after": "82b3d5ae55f7080f1e6022629cdb57bfae7cccc7",
            "user_username": "carol",
            "project": {"name": "metal-ui", "path_with_namespace": "metal-stack/metal-ui"}
        });
        Request::builder()
            .method("POST")
            .uri("/gitlab")
            .header("x-gitlab-event", "Tag Push Hook")
            .header("x-gitlab-token", token)
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn gitlab_token_is_checked() {
        let app = router(Arc::new(Registry::new()));

        let accepted = app.clone().oneshot(gitlab_request(SECRET)).await.unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);

        let rejected = app.oneshot(gitlab_request("guess")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unconfigured_path_is_404() {
        let app = router(Arc::new(Registry::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
