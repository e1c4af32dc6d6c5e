//! Heading-structured Markdown documents.
//!
//! Release notes are edited structurally: a document is a tree of
//! [`Section`]s, each owning the content lines between its heading and the
//! next heading, plus the sections nested below it. Parsing assigns each
//! heading to the nearest preceding section with a strictly lower level.
//! Content before the first heading belongs to an implicit level-0 root.
//!
//! Only ATX headings (`#` to `######` at column 0, followed by a space or the
//! end of the line) are recognised. Lines inside fenced code blocks are always
//! content.
//!
//! Serialization is canonical: heading lines are re-emitted as
//! `<hashes> <text>` and the document is trimmed. Everything else is kept
//! byte for byte, so `parse(serialize(parse(s)))` equals `parse(s)`.

mod blocks;

use std::fmt;

pub use blocks::{extract_annotated_block, to_list_item};

/// One heading and everything below it up to the next heading of the same or
/// a lower level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub level: usize,
    pub heading: String,
    pub content: Vec<String>,
    pub children: Vec<Section>,
}

impl Section {
    pub fn new(level: usize, heading: impl Into<String>) -> Self {
        Section {
            level,
            heading: heading.into(),
            content: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style helper that sets the content from a block of text.
    pub fn with_content(mut self, text: &str) -> Self {
        self.content = split_lines(text);
        self
    }

    pub fn append_child(&mut self, child: Section) {
        self.children.push(child);
    }

    pub fn prepend_child(&mut self, child: Section) {
        self.children.insert(0, child);
    }

    /// Appends the lines of `text` to this section's content.
    pub fn append_content(&mut self, text: &str) {
        self.content.extend(split_lines(text));
    }

    /// Inserts the lines of `text` before this section's content.
    pub fn prepend_content(&mut self, text: &str) {
        let mut lines = split_lines(text);
        lines.append(&mut self.content);
        self.content = lines;
    }

    /// Whether any content line equals `line` exactly.
    pub fn contains_line(&self, line: &str) -> bool {
        self.content.iter().any(|l| l == line)
    }

    fn find(&self, pred: &dyn Fn(&Section) -> bool) -> Option<&Section> {
        for child in &self.children {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    fn find_mut(&mut self, pred: &dyn Fn(&Section) -> bool) -> Option<&mut Section> {
        for child in &mut self.children {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_mut(pred) {
                return Some(found);
            }
        }
        None
    }

    fn write_lines(&self, out: &mut Vec<String>) {
        if self.level > 0 {
            let hashes = "#".repeat(self.level);
            if self.heading.is_empty() {
                out.push(hashes);
            } else {
                out.push(format!("{} {}", hashes, self.heading));
            }
        }
        out.extend(self.content.iter().cloned());
        for child in &self.children {
            child.write_lines(out);
        }
    }
}

/// A parsed Markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Markdown {
    root: Section,
}

impl Markdown {
    /// Parses `text` into a section tree. Never fails.
    pub fn parse(text: &str) -> Self {
        let mut stack: Vec<Section> = vec![Section::new(0, "")];
        let mut fence: Option<char> = None;

        for line in text.split('\n') {
            if let Some(marker) = fence_marker(line) {
                match fence {
                    None => fence = Some(marker),
                    Some(open) if open == marker => fence = None,
                    Some(_) => {}
                }
            } else if fence.is_none()
                && let Some((level, heading)) = parse_heading(line)
            {
                close_until(&mut stack, level);
                stack.push(Section::new(level, heading));
                continue;
            }

            if let Some(current) = stack.last_mut() {
                current.content.push(line.to_string());
            }
        }

        close_until(&mut stack, 1);
        Markdown {
            root: stack.pop().unwrap_or_default(),
        }
    }

    /// Content before the first heading.
    pub fn preamble(&self) -> &[String] {
        &self.root.content
    }

    /// Top-level sections.
    pub fn sections(&self) -> &[Section] {
        &self.root.children
    }

    pub fn append_section(&mut self, section: Section) {
        self.root.append_child(section);
    }

    pub fn prepend_section(&mut self, section: Section) {
        self.root.prepend_child(section);
    }

    /// Inserts a top-level section at `index`, or appends it when `index`
    /// is past the end.
    pub fn insert_section(&mut self, index: usize, section: Section) {
        let index = index.min(self.root.children.len());
        self.root.children.insert(index, section);
    }

    /// Depth-first search for a section with exactly this heading.
    pub fn find_section_by_heading(&self, level: usize, heading: &str) -> Option<&Section> {
        self.root
            .find(&|s| s.level == level && s.heading == heading)
    }

    pub fn find_section_by_heading_mut(
        &mut self,
        level: usize,
        heading: &str,
    ) -> Option<&mut Section> {
        self.root
            .find_mut(&|s| s.level == level && s.heading == heading)
    }

    /// Depth-first search for a section whose heading starts with `prefix`.
    pub fn find_section_by_heading_prefix(&self, level: usize, prefix: &str) -> Option<&Section> {
        self.root
            .find(&|s| s.level == level && s.heading.starts_with(prefix))
    }

    pub fn find_section_by_heading_prefix_mut(
        &mut self,
        level: usize,
        prefix: &str,
    ) -> Option<&mut Section> {
        self.root
            .find_mut(&|s| s.level == level && s.heading.starts_with(prefix))
    }
}

impl fmt::Display for Markdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        self.root.write_lines(&mut lines);
        f.write_str(lines.join("\n").trim())
    }
}

/// Pops sections off the stack until the top has a level strictly lower than
/// `level`, attaching each popped section to its parent.
fn close_until(stack: &mut Vec<Section>, level: usize) {
    while stack.len() > 1 && stack.last().is_some_and(|s| s.level >= level) {
        if let Some(done) = stack.pop()
            && let Some(parent) = stack.last_mut()
        {
            parent.children.push(done);
        }
    }
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some((level, String::new()));
    }
    rest.strip_prefix(' ')
        .map(|text| (level, text.trim().to_string()))
}

/// Returns the fence character if `line` opens or closes a fenced block.
pub(crate) fn fence_marker(line: &str) -> Option<char> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some('`')
    } else if trimmed.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DRAFT: &str = "\
# General
## metalctl v0.8.1
* Fix flag parsing
## metal-api v0.15.1
Some notes
# Merged Pull Requests
Automatically generated.
* Fix typo (metal-stack/docs#42) @alice";

    #[test]
    fn parses_nested_sections() {
        let doc = Markdown::parse(DRAFT);
        assert_eq!(doc.sections().len(), 2);

        let general = &doc.sections()[0];
        assert_eq!(general.heading, "General");
        assert_eq!(general.children.len(), 2);
        assert_eq!(general.children[1].heading, "metal-api v0.15.1");
        assert_eq!(general.children[1].content, vec!["Some notes"]);

        let merged = &doc.sections()[1];
        assert_eq!(merged.content.len(), 2);
    }

    #[test]
    fn round_trips_canonical_input() {
        assert_eq!(Markdown::parse(DRAFT).to_string(), DRAFT);
    }

    #[test]
    fn content_before_first_heading_is_preamble() {
        let doc = Markdown::parse("intro\n\n# A\nbody");
        assert_eq!(doc.preamble(), &["intro".to_string(), String::new()]);
        assert_eq!(doc.to_string(), "intro\n\n# A\nbody");
    }

    #[test]
    fn skipped_levels_nest_under_nearest_lower() {
        let doc = Markdown::parse("# A\n### deep\n## mid");
        let a = &doc.sections()[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].level, 3);
        assert_eq!(a.children[1].level, 2);
    }

    #[test]
    fn headings_in_fences_are_content() {
        let text = "# A\n```sh\n# not a heading\n```\n~~~\n## also not\n~~~";
        let doc = Markdown::parse(text);
        assert_eq!(doc.sections().len(), 1);
        assert!(doc.sections()[0].children.is_empty());
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn hash_without_space_is_content() {
        let doc = Markdown::parse("#hashtag\n####### seven");
        assert!(doc.sections().is_empty());
    }

    #[test]
    fn finds_depth_first() {
        let mut doc = Markdown::parse(DRAFT);
        assert!(doc.find_section_by_heading(2, "metalctl v0.8.1").is_some());
        assert!(doc.find_section_by_heading(1, "metalctl v0.8.1").is_none());
        assert_eq!(
            doc.find_section_by_heading_prefix(2, "metal-api ")
                .map(|s| s.heading.as_str()),
            Some("metal-api v0.15.1")
        );

        doc.find_section_by_heading_prefix_mut(2, "metalctl ")
            .unwrap()
            .append_content("* Another fix");
        assert!(doc.to_string().contains("* Fix flag parsing\n* Another fix\n## metal-api"));
    }

    #[test]
    fn prepend_and_append() {
        let mut doc = Markdown::parse(DRAFT);
        doc.prepend_section(Section::new(1, "Breaking Changes").with_content("* removed flag"));
        doc.append_section(Section::new(1, "Footer"));

        let general = doc.find_section_by_heading_mut(1, "General").unwrap();
        general.prepend_child(Section::new(2, "metal-db v0.1.0"));
        general.prepend_content("Preface");

        let out = doc.to_string();
        assert!(out.starts_with("# Breaking Changes\n* removed flag\n# General\nPreface\n## metal-db v0.1.0\n## metalctl"));
        assert!(out.ends_with("# Footer"));
    }

    #[test]
    fn insert_section_clamps_index() {
        let mut doc = Markdown::parse(DRAFT);
        doc.insert_section(1, Section::new(1, "Middle"));
        doc.insert_section(99, Section::new(1, "Last"));
        let headings: Vec<_> = doc.sections().iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, ["General", "Middle", "Merged Pull Requests", "Last"]);
    }

    proptest! {
        /// Serializing a parsed document yields a fixed point.
        #[test]
        fn serialization_is_fixed_point(
            lines in prop::collection::vec(
                prop_oneof![
                    "#{1,7}( [a-z ]{0,8})?",
                    "[a-z #*-]{0,12}",
                    Just("```".to_string()),
                    Just("~~~go".to_string()),
                    Just(String::new()),
                    Just("  ".to_string()),
                ],
                0..30,
            )
        ) {
            let text = lines.join("\n");
            let once = Markdown::parse(&text).to_string();
            let twice = Markdown::parse(&once).to_string();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(Markdown::parse(&once), Markdown::parse(&twice));
        }
    }
}
