//! `line-replace` patcher.

use serde::Deserialize;

use crate::template;

use super::{FileSystem, PatchError, read, write};

/// Replaces one line of a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LinePatch {
    /// Path of the file, relative to the repository root.
    pub file: String,

    /// 1-based line number.
    pub line: usize,

    /// Optional template; `%s` is replaced by the value.
    #[serde(default)]
    pub replace_template: Option<String>,
}

impl LinePatch {
    pub fn validate(&self) -> Result<(), PatchError> {
        if self.file.is_empty() {
            return Err(PatchError::Invalid("line-replace requires a file".into()));
        }
        if self.line == 0 {
            return Err(PatchError::Invalid(format!(
                "line numbers start at 1 (file {})",
                self.file
            )));
        }
        if let Some(t) = &self.replace_template
            && template::placeholder_count(t) != 1
        {
            return Err(PatchError::Invalid(format!(
                "replace-template {t:?} must contain exactly one placeholder"
            )));
        }
        Ok(())
    }

    pub fn apply(&self, fs: &mut dyn FileSystem, value: &str) -> Result<(), PatchError> {
        let content = read(fs, &self.file)?;
        let patched = replace_line(&content, self.line, &self.render(value)).ok_or_else(|| {
            PatchError::LineOutOfRange {
                path: self.file.clone(),
                line: self.line,
                count: content.split('\n').count(),
            }
        })?;
        write(fs, &self.file, &patched)
    }

    fn render(&self, value: &str) -> String {
        match &self.replace_template {
            Some(t) => template::render(t, &[value]),
            None => value.to_string(),
        }
    }
}

/// Replaces the 1-based `line` of `content`. Returns `None` if out of range.
fn replace_line(content: &str, line: usize, replacement: &str) -> Option<String> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    let slot = lines.get_mut(line.checked_sub(1)?)?;
    *slot = replacement;
    Some(lines.join("\n"))
}
