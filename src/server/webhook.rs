//! Webhook endpoint handlers.
//!
//! A delivery is verified before anything else is read from it, then parsed
//! into a typed event and handed to the endpoint's registry in a background
//! task. The response does not wait for the handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{Instrument, Span, debug, error, info_span, warn};

use super::AppState;
use crate::dispatch::Registry;
use crate::types::DeliveryId;
use crate::webhooks::{
    ParseError, WebhookEvent, parse_gitlab_webhook, parse_webhook, verify_gitlab_token,
    verify_signature,
};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";
const HEADER_GITLAB_EVENT: &str = "x-gitlab-event";
const HEADER_GITLAB_TOKEN: &str = "x-gitlab-token";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Signature or token does not match the configured secret.
    #[error("invalid signature")]
    InvalidSignature,

    #[error("cannot parse payload: {0}")]
    Parse(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        // Diagnostics go to the log; the forge only sees the status.
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// GitHub webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-GitHub-Event`: Event type (e.g., "release", "issue_comment")
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload
/// - Optional headers:
///   - `X-GitHub-Delivery`: Delivery ID, carried in the log span
///
/// # Response
///
/// - 200 OK: Event accepted (including event types the bot ignores)
/// - 500 Internal Server Error: Missing header, invalid signature or
///   malformed payload
pub async fn github_webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let delivery_id = get_header(&headers, HEADER_DELIVERY)
        .map(DeliveryId::new)
        .unwrap_or_else(|_| DeliveryId::new("unknown"));

    let signature_header = get_header(&headers, HEADER_SIGNATURE).inspect_err(|_| {
        warn!(delivery_id = %delivery_id, "webhook without signature");
    })?;
    if !verify_signature(&body, &signature_header, app_state.secret().as_bytes()) {
        warn!(delivery_id = %delivery_id, "invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let event_type = get_header(&headers, HEADER_EVENT)?;
    let event = parse_webhook(&event_type, &body).inspect_err(|e| {
        error!(delivery_id = %delivery_id, event_type = %event_type, error = %e, "cannot parse webhook");
    })?;

    let Some(event) = event else {
        warn!(delivery_id = %delivery_id, event_type = %event_type, "ignoring unsupported event type");
        return Ok(StatusCode::OK);
    };

    spawn_dispatch(app_state, event, delivery_id.as_str());
    Ok(StatusCode::OK)
}

/// GitLab webhook handler.
///
/// Authenticated by comparing `X-Gitlab-Token` with the configured secret.
pub async fn gitlab_webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let token = get_header(&headers, HEADER_GITLAB_TOKEN)?;
    if !verify_gitlab_token(&token, app_state.secret()) {
        warn!("invalid gitlab webhook token");
        return Err(WebhookError::InvalidSignature);
    }

    let event_type = get_header(&headers, HEADER_GITLAB_EVENT)?;
    let event = parse_gitlab_webhook(&event_type, &body).inspect_err(|e| {
        error!(event_type = %event_type, error = %e, "cannot parse gitlab webhook");
    })?;

    let Some(event) = event else {
        warn!(event_type = %event_type, "ignoring unsupported gitlab event type");
        return Ok(StatusCode::OK);
    };

    spawn_dispatch(app_state, event, "gitlab");
    Ok(StatusCode::OK)
}

/// Runs the registry for `event` in the background under a span carrying
/// the event's context.
fn spawn_dispatch(app_state: AppState, event: WebhookEvent, delivery_id: &str) {
    let span = info_span!(
        "webhook",
        delivery_id,
        event = event.kind(),
        action = event.action().unwrap_or_default(),
        sender = event.sender(),
        organization = event.organization(),
        repository = %event.repository_url().unwrap_or_default(),
    );

    let registry = std::sync::Arc::clone(app_state.registry());
    let parent = span.clone();
    tokio::spawn(
        async move {
            let spawned = dispatch(&registry, event, &parent).await;
            debug!(handlers = spawned, "dispatched event");
        }
        .instrument(span),
    );
}

/// Spawns the handlers registered for the concrete type of `event`.
async fn dispatch(registry: &Registry, event: WebhookEvent, span: &Span) -> usize {
    let handles = match event {
        WebhookEvent::Release(e) => registry.run(e, span).await,
        WebhookEvent::Push(e) => registry.run(e, span).await,
        WebhookEvent::TagPush(e) => registry.run(e, span).await,
        WebhookEvent::PullRequest(e) => registry.run(e, span).await,
        WebhookEvent::IssueComment(e) => registry.run(e, span).await,
        WebhookEvent::Repository(e) => registry.run(e, span).await,
        WebhookEvent::Issues(e) => registry.run(e, span).await,
        WebhookEvent::ProjectV2Item(e) => registry.run(e, span).await,
    };
    handles.len()
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
