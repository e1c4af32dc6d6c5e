//! Declarative file patchers.
//!
//! A patcher applies one idempotent mutation to a named file in a checked-out
//! repository. Two kinds exist:
//!
//! - [`LinePatch`] (`line-replace`): replace a 1-based line, optionally through
//!   a printf-style template.
//! - [`YamlPathPatch`] (`yaml-path-version-patch`): replace the value at a
//!   dotted path in a YAML document, optionally gated by a semantic version
//!   comparison.
//!
//! Patchers never touch the working copy directly. They operate against a
//! [`FileSystem`], which keeps them independent of git and easy to test.
//!
//! # Configuration
//!
//! ```yaml
//! - type: line-replace
//!   args:
//!     file: metal_python/version.py
//!     line: 1
//!     replace-template: "VERSION = '%s'"
//! - type: yaml-path-version-patch
//!   args:
//!     file: release.yaml
//!     yaml-path: docker-images.metal-stack.control-plane.metalctl.tag
//!     version-compare: true
//! ```

mod line;
mod yaml_path;

use std::io;

use serde::Deserialize;
use thiserror::Error;

pub use line::LinePatch;
pub use yaml_path::{YamlPathPatch, get_path, read_yaml_value, set_path};

/// Errors raised while validating or applying a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The file to patch does not exist in the working copy.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Reading or writing the file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The configured line is outside the file.
    #[error("line {line} does not exist in {path} ({count} lines)")]
    LineOutOfRange {
        path: String,
        line: usize,
        count: usize,
    },

    /// The configured YAML path does not resolve.
    #[error("yaml path {yaml_path} not found in {path}")]
    PathNotFound { path: String, yaml_path: String },

    /// The file is not valid YAML, or could not be emitted again.
    #[error("yaml error in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value taking part in a version comparison is not a semantic version.
    #[error("invalid semantic version {value:?}: {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },

    /// The patch configuration is inconsistent.
    #[error("invalid patch configuration: {0}")]
    Invalid(String),
}

/// Reader/writer pair a patch is applied against.
pub trait FileSystem {
    /// Reads a file relative to the repository root.
    fn read_file(&self, path: &str) -> io::Result<String>;

    /// Writes a file relative to the repository root, replacing its content.
    fn write_file(&mut self, path: &str, content: &str) -> io::Result<()>;
}

/// A configured patch, as found in action arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "kebab-case")]
pub enum PatchSpec {
    /// Replace a single line.
    LineReplace(LinePatch),
    /// Replace a value at a YAML path.
    YamlPathVersionPatch(YamlPathPatch),
}

impl PatchSpec {
    /// Checks the configuration for contradictions.
    pub fn validate(&self) -> Result<(), PatchError> {
        match self {
            PatchSpec::LineReplace(p) => p.validate(),
            PatchSpec::YamlPathVersionPatch(p) => p.validate(),
        }
    }

    /// Applies the patch with `value` as the replacement.
    pub fn apply(&self, fs: &mut dyn FileSystem, value: &str) -> Result<(), PatchError> {
        match self {
            PatchSpec::LineReplace(p) => p.apply(fs, value),
            PatchSpec::YamlPathVersionPatch(p) => p.apply(fs, value),
        }
    }

    /// The file this patch modifies.
    pub fn file(&self) -> &str {
        match self {
            PatchSpec::LineReplace(p) => &p.file,
            PatchSpec::YamlPathVersionPatch(p) => &p.file,
        }
    }
}

/// Applies patches in declared order, stopping at the first failure.
pub fn apply_all(
    patches: &[PatchSpec],
    fs: &mut dyn FileSystem,
    value: &str,
) -> Result<(), PatchError> {
    for patch in patches {
        patch.apply(fs, value)?;
    }
    Ok(())
}

/// Validates a list of patches.
pub fn validate_all(patches: &[PatchSpec]) -> Result<(), PatchError> {
    patches.iter().try_for_each(PatchSpec::validate)
}

pub(crate) fn read(fs: &dyn FileSystem, path: &str) -> Result<String, PatchError> {
    fs.read_file(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PatchError::FileNotFound {
            path: path.to_string(),
        },
        _ => PatchError::Io {
            path: path.to_string(),
            source: e,
        },
    })
}

pub(crate) fn write(fs: &mut dyn FileSystem, path: &str, content: &str) -> Result<(), PatchError> {
    fs.write_file(path, content).map_err(|e| PatchError::Io {
        path: path.to_string(),
        source: e,
    })
}
