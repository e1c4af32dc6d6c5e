//! Helpers for embedding text blocks into release notes.

use super::fence_marker;

/// Returns the body of the first fenced code block annotated with
/// `annotation`, trimmed.
///
/// ```
/// use metal_robot::markdown::extract_annotated_block;
///
/// let body = "Description\n\n```ACTIONS_REQUIRED\nRun the migration.\n```\n";
/// assert_eq!(
///     extract_annotated_block("ACTIONS_REQUIRED", body).as_deref(),
///     Some("Run the migration.")
/// );
/// assert_eq!(extract_annotated_block("BREAKING_CHANGE", body), None);
/// ```
pub fn extract_annotated_block(annotation: &str, text: &str) -> Option<String> {
    let mut lines = text.lines();

    let marker = lines.by_ref().find_map(|line| {
        let marker = fence_marker(line)?;
        let info = line.trim_start().trim_start_matches(marker).trim();
        (info == annotation).then_some(marker)
    })?;

    let mut body = Vec::new();
    for line in lines {
        if fence_marker(line) == Some(marker) && line.trim().trim_start_matches(marker).is_empty() {
            let joined = body.join("\n");
            let trimmed = joined.trim();
            return (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        body.push(line);
    }

    None
}

/// Formats a block of text as a single bullet list item.
///
/// The first line gets a `* ` prefix, continuation lines are indented by two
/// spaces so they stay inside the item. Blank lines stay empty.
///
/// ```
/// use metal_robot::markdown::to_list_item;
///
/// assert_eq!(to_list_item("first\nsecond"), "* first\n  second");
/// ```
pub fn to_list_item(text: &str) -> String {
    text.trim()
        .lines()
        .enumerate()
        .map(|(i, line)| match (i, line.trim_end()) {
            (0, l) => format!("* {l}"),
            (_, "") => String::new(),
            (_, l) => format!("  {l}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
