use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)\.(\d+)(?:\.(\d+))?(?:[-+].*)?$").expect("version pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("cannot parse version {0:?}: expected [v]MAJOR.MINOR[.PATCH]")]
    Parse(String),
}

/// A service release.
///
/// Equality and ordering only look at `(major, minor)`. The patch component is
/// carried along for display and for drift checks, which need the exact tag of
/// the running instance (see [`Version::git_tag_with_patch`]).
#[derive(Debug, Clone, Copy)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: None,
        }
    }

    pub const fn with_patch(self, patch: u32) -> Self {
        Self {
            patch: Some(patch),
            ..self
        }
    }

    /// Parse `[v]MAJOR.MINOR[.PATCH]`, tolerating pre-release or build suffixes.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        let caps = VERSION_PATTERN
            .captures(trimmed)
            .ok_or_else(|| VersionError::Parse(raw.to_string()))?;

        let component = |idx: usize| -> Result<Option<u32>, VersionError> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<u32>())
                .transpose()
                .map_err(|_| VersionError::Parse(raw.to_string()))
        };

        let major = component(1)?.ok_or_else(|| VersionError::Parse(raw.to_string()))?;
        let minor = component(2)?.ok_or_else(|| VersionError::Parse(raw.to_string()))?;
        let patch = component(3)?;

        Ok(Self {
            major,
            minor,
            patch,
        })
    }

    /// `vMAJOR.MINOR`, the key used for stitched migration bounds.
    pub fn git_tag(&self) -> String {
        format!("v{}.{}", self.major, self.minor)
    }

    /// `vMAJOR.MINOR.PATCH`, the key used to locate an expected schema.
    pub fn git_tag_with_patch(&self, patch: u32) -> String {
        format!("v{}.{}.{}", self.major, self.minor, patch)
    }

    /// Compare including the patch component. A missing patch is unknown and
    /// never equal to a concrete one.
    pub fn exact_eq(&self, other: &Version) -> bool {
        self == other && self.patch.is_some() && self.patch == other.patch
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => f.write_str(&self.git_tag_with_patch(patch)),
            None => f.write_str(&self.git_tag()),
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
