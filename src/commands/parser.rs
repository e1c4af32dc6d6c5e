//! Parser for slash-commands in comment text.

use std::fmt;

/// A parsed slash-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/ok-to-build`
    OkToBuild,
    /// `/freeze`
    Freeze,
    /// `/unfreeze`
    Unfreeze,
    /// `/tag <name>`
    Tag(String),
    /// `/bump-release <repository> <version>`
    BumpRelease { repository: String, version: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::OkToBuild => "ok-to-build",
            Command::Freeze => "freeze",
            Command::Unfreeze => "unfreeze",
            Command::Tag(_) => "tag",
            Command::BumpRelease { .. } => "bump-release",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Tag(name) => write!(f, "/tag {name}"),
            Command::BumpRelease {
                repository,
                version,
            } => write!(f, "/bump-release {repository} {version}"),
            other => write!(f, "/{}", other.name()),
        }
    }
}

/// Parses the first slash-command found in comment text.
///
/// # Parsing Rules
///
/// - The text is scanned line by line; the first line holding a valid command wins
/// - Leading and trailing whitespace of a line is ignored
/// - A command must start its line (`> /freeze` in a quote is not a command)
/// - Command names are case-sensitive and must be followed by whitespace or
///   the end of the line (`/freezer` is not `/freeze`)
/// - Commands with arguments need all of them; extra words are ignored
///
/// ```
/// use metal_robot::commands::{Command, parse_command};
///
/// assert_eq!(parse_command("/freeze"), Some(Command::Freeze));
/// assert_eq!(
///     parse_command("/bump-release metalctl v0.8.1"),
///     Some(Command::BumpRelease {
///         repository: "metalctl".to_string(),
///         version: "v0.8.1".to_string(),
///     })
/// );
/// assert_eq!(parse_command("please /freeze"), None);
/// assert_eq!(parse_command("/tag"), None);
/// ```
pub fn parse_command(text: &str) -> Option<Command> {
    text.lines().find_map(parse_line)
}

fn parse_line(line: &str) -> Option<Command> {
    let mut words = line.trim().strip_prefix('/')?.split_whitespace();
    match words.next()? {
        "ok-to-build" => Some(Command::OkToBuild),
        "freeze" => Some(Command::Freeze),
        "unfreeze" => Some(Command::Unfreeze),
        "tag" => words.next().map(|name| Command::Tag(name.to_string())),
        "bump-release" => {
            let repository = words.next()?.to_string();
            let version = words.next()?.to_string();
            Some(Command::BumpRelease {
                repository,
                version,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ==================== Valid command parsing ====================

    #[test]
    fn simple_commands_parse() {
        assert_eq!(parse_command("/ok-to-build"), Some(Command::OkToBuild));
        assert_eq!(parse_command("/freeze"), Some(Command::Freeze));
        assert_eq!(parse_command("/unfreeze"), Some(Command::Unfreeze));
    }

    #[test]
    fn extra_words_are_ignored() {
        assert_eq!(
            parse_command("/freeze until the CVE fix is in"),
            Some(Command::Freeze)
        );
        assert_eq!(
            parse_command("/tag v1.0.0 please"),
            Some(Command::Tag("v1.0.0".to_string()))
        );
    }

    #[test]
    fn missing_arguments_do_not_parse() {
        assert_eq!(parse_command("/tag"), None);
        assert_eq!(parse_command("/tag   "), None);
        assert_eq!(parse_command("/bump-release metalctl"), None);
    }

    #[test]
    fn unknown_commands_are_ignored() {
        assert_eq!(parse_command("/freezer"), None);
        assert_eq!(parse_command("/FREEZE"), None);
        assert_eq!(parse_command("/ not-a-command"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn quoted_commands_are_ignored() {
        assert_eq!(parse_command("> /freeze"), None);
        assert_eq!(parse_command("see `/freeze`"), None);
    }

    // ==================== Multiple commands: first wins ====================

    #[test]
    fn first_command_wins() {
        assert_eq!(parse_command("/unfreeze\n/freeze"), Some(Command::Unfreeze));
        assert_eq!(
            parse_command("Thanks!\n/tag\n/freeze\r\n/unfreeze"),
            Some(Command::Freeze)
        );
    }

    #[test]
    fn display_renders_the_command_line() {
        assert_eq!(Command::OkToBuild.to_string(), "/ok-to-build");
        assert_eq!(
            Command::BumpRelease {
                repository: "metal-api".to_string(),
                version: "v0.15.1".to_string()
            }
            .to_string(),
            "/bump-release metal-api v0.15.1"
        );
    }

    fn arb_command() -> impl Strategy<Value = Command> {
        let word = "[a-zA-Z0-9._-]{1,20}";
        prop_oneof![
            Just(Command::OkToBuild),
            Just(Command::Freeze),
            Just(Command::Unfreeze),
            word.prop_map(Command::Tag),
            (word, word).prop_map(|(repository, version)| Command::BumpRelease {
                repository,
                version
            }),
        ]
    }

    proptest! {
        /// Arbitrary text should never cause a panic.
        #[test]
        fn arbitrary_text_never_panics(text: String) {
            let _ = parse_command(&text);
        }

        /// A rendered command parses back to itself, wherever it sits in the comment.
        #[test]
        fn rendered_commands_parse(
            cmd in arb_command(),
            prefix in "([a-zA-Z ,.!]{0,30}\n){0,3}",
            ws in "[ \t]{0,3}",
        ) {
            let text = format!("{prefix}{ws}{cmd}{ws}\nmore text");
            prop_assert_eq!(parse_command(&text), Some(cmd));
        }

        /// Text without a leading slash on any line never yields a command.
        #[test]
        fn no_slash_no_command(text in "[^/]*") {
            prop_assert_eq!(parse_command(&text), None);
        }
    }
}
