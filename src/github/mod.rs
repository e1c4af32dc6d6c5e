//! GitHub API adapter.
//!
//! Authenticates as a GitHub App installation (JWT via `jsonwebtoken`, then
//! installation tokens), exposes the REST and GraphQL operations the actions
//! need, and mints installation tokens for use as git credentials.
//!
//! No call is retried. Conditions callers treat as success (resource already
//! exists, not found) are recognised by [`GitHubApiError`].

mod client;
mod error;
mod graphql;
pub mod models;

pub use client::GitHubClient;
pub use error::GitHubApiError;
pub use graphql::{Label, label_ids_by_name};

#[cfg(test)]
pub(crate) mod mock;
