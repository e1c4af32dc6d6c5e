//! Core domain types shared across the bot.

pub mod ids;
pub mod tag;

pub use ids::{CommentId, DeliveryId, NodeId, PrNumber, RepoId};
pub use tag::{InvalidTag, ReleaseTag, parse_version_lenient};
