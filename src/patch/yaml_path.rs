//! `yaml-path-version-patch` patcher.
//!
//! The document is converted from YAML into a JSON value, edited at a dotted
//! path, and emitted as YAML again. Comments and custom formatting in the
//! file do not survive the round trip; key order does.

use serde::Deserialize;
use serde_json::Value;

use crate::template;
use crate::types::parse_version_lenient;

use super::{FileSystem, PatchError, read, write};

/// Replaces the value at a dotted YAML path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct YamlPathPatch {
    pub file: String,

    /// Dotted path, e.g. `docker-images.metal-stack.control-plane.metalctl.tag`.
    /// Numeric segments index into sequences.
    pub yaml_path: String,

    #[serde(default)]
    pub template: Option<String>,

    /// Only write when the new version is strictly greater than the current one.
    #[serde(default)]
    pub version_compare: bool,
}

impl YamlPathPatch {
    pub fn validate(&self) -> Result<(), PatchError> {
        if self.file.is_empty() {
            return Err(PatchError::Invalid(
                "yaml-path-version-patch requires a file".into(),
            ));
        }
        if self.yaml_path.is_empty() {
            return Err(PatchError::Invalid(format!(
                "yaml-path-version-patch on {} requires a yaml-path",
                self.file
            )));
        }
        if let Some(t) = &self.template {
            if self.version_compare {
                return Err(PatchError::Invalid(format!(
                    "template and version-compare are mutually exclusive (file {})",
                    self.file
                )));
            }
            if template::placeholder_count(t) != 1 {
                return Err(PatchError::Invalid(format!(
                    "template {t:?} must contain exactly one placeholder"
                )));
            }
        }
        Ok(())
    }

    pub fn apply(&self, fs: &mut dyn FileSystem, value: &str) -> Result<(), PatchError> {
        let content = read(fs, &self.file)?;
        let mut doc = parse_document(&self.file, &content)?;

        let current = get_path(&doc, &self.yaml_path).ok_or_else(|| self.not_found())?;

        if self.version_compare && !is_upgrade(current, value)? {
            tracing::debug!(
                file = %self.file,
                path = %self.yaml_path,
                current = %scalar_text(current),
                candidate = %value,
                "not patching, version is not newer"
            );
            return Ok(());
        }

        let rendered = match &self.template {
            Some(t) => template::render(t, &[value]),
            None => value.to_string(),
        };

        if !set_path(&mut doc, &self.yaml_path, Value::String(rendered)) {
            return Err(self.not_found());
        }

        let out = serde_yaml::to_string(&doc).map_err(|source| PatchError::Yaml {
            path: self.file.clone(),
            source,
        })?;
        write(fs, &self.file, &out)
    }

    fn not_found(&self) -> PatchError {
        PatchError::PathNotFound {
            path: self.file.clone(),
            yaml_path: self.yaml_path.clone(),
        }
    }
}

fn parse_document(path: &str, content: &str) -> Result<Value, PatchError> {
    serde_yaml::from_str(content).map_err(|source| PatchError::Yaml {
        path: path.to_string(),
        source,
    })
}

fn is_upgrade(current: &Value, candidate: &str) -> Result<bool, PatchError> {
    let old_text = scalar_text(current);
    let old = parse_version_lenient(&old_text).map_err(|source| PatchError::InvalidVersion {
        value: old_text.clone(),
        source,
    })?;
    let new = parse_version_lenient(candidate).map_err(|source| PatchError::InvalidVersion {
        value: candidate.to_string(),
        source,
    })?;
    Ok(new > old)
}

/// Text form of a scalar; strings are returned without quotes.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Looks up a dotted path.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Replaces the value at an existing dotted path. Returns `false` if the
/// path does not resolve.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut node = doc;
    for segment in path.split('.') {
        let next = match node {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(i) => items.get_mut(i),
                Err(_) => None,
            },
            _ => None,
        };
        match next {
            Some(n) => node = n,
            None => return false,
        }
    }
    *node = value;
    true
}

/// Reads the scalar at `yaml_path` from `file`.
pub fn read_yaml_value(fs: &dyn FileSystem, file: &str, yaml_path: &str) -> Result<String, PatchError> {
    let content = read(fs, file)?;
    let doc = parse_document(file, &content)?;
    get_path(&doc, yaml_path)
        .map(scalar_text)
        .ok_or_else(|| PatchError::PathNotFound {
            path: file.to_string(),
            yaml_path: yaml_path.to_string(),
        })
}
