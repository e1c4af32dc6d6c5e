//! Webhook authenticity checks.
//!
//! - GitHub signs the raw payload with HMAC-SHA256 using the webhook secret and
//!   sends `sha256=<hex>` in `X-Hub-Signature-256`.
//! - GitLab sends the secret itself in `X-Gitlab-Token`.
//!
//! Both comparisons are constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decodes a `sha256=<hex>` header value. Returns `None` when malformed.
///
/// ```
/// use metal_robot::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=00ff"), Some(vec![0x00, 0xff]));
/// assert!(parse_signature_header("sha1=00ff").is_none());
/// assert!(parse_signature_header("sha256=zz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.strip_prefix("sha256=")?).ok()
}

/// HMAC-SHA256 of `payload` keyed with `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature the way GitHub sends it.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Checks a GitHub `X-Hub-Signature-256` header against the payload.
///
/// ```
/// use metal_robot::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let header = format_signature_header(&compute_signature(b"{}", b"secret"));
/// assert!(verify_signature(b"{}", &header, b"secret"));
/// assert!(!verify_signature(b"{ }", &header, b"secret"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Checks a GitLab `X-Gitlab-Token` header against the configured secret.
///
/// Both values are hashed with a fixed key before comparing, so the
/// comparison does not leak the secret's length or content through timing.
pub fn verify_gitlab_token(token: &str, secret: &str) -> bool {
    let digest = compute_signature(secret.as_bytes(), b"x-gitlab-token");
    let Ok(mut mac) = HmacSha256::new_from_slice(b"x-gitlab-token") else {
        return false;
    };
    mac.update(token.as_bytes());
    mac.verify_slice(&digest).is_ok()
}
