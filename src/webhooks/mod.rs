//! Webhook authentication and payload parsing for GitHub and GitLab.

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{
    CommentAction, IssueAction, IssueCommentEvent, IssuesEvent, PrAction, ProjectItemAction,
    ProjectV2ItemEvent, PullRequestEvent, PushEvent, ReleaseAction, ReleaseEvent,
    RepositoryAction, RepositoryEvent, TagPushEvent, WebhookEvent,
};
pub use parser::{ParseError, parse_gitlab_webhook, parse_webhook};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_gitlab_token,
    verify_signature,
};
