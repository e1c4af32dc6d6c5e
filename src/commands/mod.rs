//! Slash-commands issued in issue and pull request comments.
//!
//! # Supported Commands
//!
//! - `/ok-to-build` - builds a pull request from a fork inside the organization
//! - `/freeze` - stops the release pull request from receiving further bumps
//! - `/unfreeze` - lifts a previous `/freeze`
//! - `/tag <name>` - tags the head of the pull request
//! - `/bump-release <repository> <version>` - aggregates a version by hand
//!
//! # Example
//!
//! ```
//! use metal_robot::commands::{Command, parse_command};
//!
//! let comment = "Looks good to me.\n\n/ok-to-build";
//! assert_eq!(parse_command(comment), Some(Command::OkToBuild));
//!
//! assert_eq!(
//!     parse_command("/tag v0.2.0-rc.1"),
//!     Some(Command::Tag("v0.2.0-rc.1".to_string()))
//! );
//! ```

mod parser;

pub use parser::{Command, parse_command};
