//! Release tags of the form `v<semver>`.

use std::fmt;

use semver::Version;
use thiserror::Error;

/// Error returned when a tag is not a `v`-prefixed semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tag {tag:?} is not a v-prefixed semantic version: {reason}")]
pub struct InvalidTag {
    pub tag: String,
    pub reason: String,
}

/// A validated release tag such as `v0.8.1`.
///
/// The original tag text is kept verbatim so it can be written back into
/// files and branch names exactly as the source repository published it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
    raw: String,
    version: Version,
}

impl ReleaseTag {
    /// Parses a tag, requiring the leading `v`.
    ///
    /// ```
    /// use metal_robot::types::ReleaseTag;
    ///
    /// let tag = ReleaseTag::parse("v0.8.1").unwrap();
    /// assert_eq!(tag.version().minor, 8);
    /// assert!(ReleaseTag::parse("0.8.1").is_err());
    /// assert!(ReleaseTag::parse("v0.8").is_err());
    /// ```
    pub fn parse(tag: &str) -> Result<Self, InvalidTag> {
        let stripped = tag.strip_prefix('v').ok_or_else(|| InvalidTag {
            tag: tag.to_string(),
            reason: "missing leading 'v'".to_string(),
        })?;

        let version = Version::parse(stripped).map_err(|e| InvalidTag {
            tag: tag.to_string(),
            reason: e.to_string(),
        })?;

        Ok(ReleaseTag {
            raw: tag.to_string(),
            version,
        })
    }

    /// Parses a git ref like `refs/tags/v1.2.3`.
    ///
    /// Returns `None` when the ref is not a tag ref.
    pub fn from_tag_ref(git_ref: &str) -> Option<Result<Self, InvalidTag>> {
        git_ref.strip_prefix("refs/tags/").map(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parses a version string leniently: an optional leading `v` is stripped.
pub fn parse_version_lenient(s: &str) -> Result<Version, semver::Error> {
    Version::parse(s.trim().trim_start_matches('v'))
}
