//! Remote tags and semantic-version normalization.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use crate::Result;

// Semantic version 2.0.0 grammar with an optional leading `v`.
static SEMVER_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .unwrap()
});

/// A tag as reported by the remote version-control host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub tag: String,
    pub commit: String,
}

impl RemoteTag {
    pub fn new(tag: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            commit: commit.into(),
        }
    }

    /// The normalized version of this tag, if it is a semantic version.
    pub fn version(&self) -> Option<Version> {
        Version::from_tag(&self.tag)
    }
}

/// Canonical version string of a tag: the tag with any leading `v` removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Parse a tag name, returning `None` unless it is a valid semantic version.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if !SEMVER_TAG_REGEX.is_match(tag) {
            return None;
        }
        Some(Self(tag.strip_prefix('v').unwrap_or(tag).to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote tag that passed normalization, paired with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedTag {
    pub version: Version,
    pub remote: RemoteTag,
}

/// Filters remote tags down to one semantic-version tag per version.
///
/// Tags are walked in reverse of the order the host listed them and the
/// first tag seen for a version wins, so when both `1.2.3` and `v1.2.3`
/// exist the one listed later upstream is kept. The output keeps that
/// reversed order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagNormalizer;

impl TagNormalizer {
    pub fn normalize(&self, tags: &[RemoteTag]) -> Vec<VersionedTag> {
        let mut seen = HashSet::new();
        tags.iter()
            .rev()
            .filter_map(|remote| {
                let version = remote.version()?;
                seen.insert(version.clone()).then(|| VersionedTag {
                    version,
                    remote: remote.clone(),
                })
            })
            .collect()
    }
}

/// Lists the tags of a remote repository.
#[async_trait]
pub trait TagLister: Send + Sync {
    /// List tags of the repository at `repo_url`, in the order the host returns them.
    async fn list_tags(&self, repo_url: &str) -> Result<Vec<RemoteTag>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<RemoteTag> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| RemoteTag::new(*name, format!("c{}", i)))
            .collect()
    }

    fn tag_names(normalized: &[VersionedTag]) -> Vec<&str> {
        normalized.iter().map(|t| t.remote.tag.as_str()).collect()
    }

    #[test]
    fn test_version_from_tag() {
        assert_eq!(Version::from_tag("1.0.0").unwrap().as_str(), "1.0.0");
        assert_eq!(Version::from_tag("v1.0.0").unwrap().as_str(), "1.0.0");
        assert_eq!(
            Version::from_tag("v2.3.4-beta.1").unwrap().as_str(),
            "2.3.4-beta.1"
        );
        assert_eq!(
            Version::from_tag("1.0.0-rc.1+build.5").unwrap().as_str(),
            "1.0.0-rc.1+build.5"
        );
    }

    #[test]
    fn test_rejects_non_semver_tags() {
        for tag in [
            "release-1",
            "bogus",
            "1.0",
            "v1",
            "01.0.0",
            "1.0.0-",
            "1.0.0-01",
            "V1.0.0",
            "vv1.0.0",
            "1.0.0 ",
        ] {
            assert!(Version::from_tag(tag).is_none(), "{} should be rejected", tag);
        }
    }

    #[test]
    fn test_later_listed_duplicate_wins() {
        let normalized = TagNormalizer.normalize(&tags(&["1.0.0", "v1.0.0"]));
        assert_eq!(tag_names(&normalized), vec!["v1.0.0"]);
        assert_eq!(normalized[0].version.as_str(), "1.0.0");

        let normalized = TagNormalizer.normalize(&tags(&["v1.0.0", "1.0.0"]));
        assert_eq!(tag_names(&normalized), vec!["1.0.0"]);
    }

    #[test]
    fn test_output_is_reversed_and_filtered() {
        let normalized =
            TagNormalizer.normalize(&tags(&["0.1.0", "release-1", "v0.2.0", "0.3.0-alpha"]));
        assert_eq!(tag_names(&normalized), vec!["0.3.0-alpha", "v0.2.0", "0.1.0"]);
        assert_eq!(normalized[1].remote.commit, "c2");
    }

    #[test]
    fn test_empty_and_all_invalid() {
        assert!(TagNormalizer.normalize(&[]).is_empty());
        assert!(TagNormalizer.normalize(&tags(&["latest", "nightly"])).is_empty());
    }
}
