//! metal-robot - a GitHub/GitLab webhook bot that coordinates releases
//! across the repositories of a multi-repository product.
//!
//! Forge events arrive at the [`server`], are verified and parsed by
//! [`webhooks`] and fanned out by the [`dispatch`] registry to the
//! [`actions`] configured for that webhook. Actions talk to GitHub through
//! [`github`] and change repositories through [`git`] working copies.

pub mod actions;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod markdown;
pub mod patch;
pub mod server;
pub mod template;
pub mod types;
pub mod webhooks;
