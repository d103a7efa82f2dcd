//! Artifactory version parsing and capability gating.

use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;

use crate::{Error, Result};

/// First Artifactory release with the scoped Access API token endpoints.
pub const MIN_SCOPED_TOKEN_VERSION: Version = Version::new(7, 21, 1);

/// Body of `GET /artifactory/api/system/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceVersion {
    /// Dotted version string (`7.19.10`).
    pub version: String,
    /// Build revision.
    #[serde(default)]
    pub revision: Option<String>,
}

impl ServiceVersion {
    /// Parse the dotted version string.
    pub fn parsed(&self) -> Result<Version> {
        self.version.parse()
    }

    /// Fail with [`Error::Unsupported`] unless this release has scoped tokens.
    pub fn require_scoped_tokens(&self) -> Result<Version> {
        let version = self.parsed()?;
        if version < MIN_SCOPED_TOKEN_VERSION {
            return Err(Error::Unsupported {
                found: self.version.clone(),
                required: MIN_SCOPED_TOKEN_VERSION.to_string(),
            });
        }
        Ok(version)
    }
}

/// Three-part numeric version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// Construct a version from its parts.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::str::FromStr for Version {
    type Err = Error;

    /// Accepts `7`, `7.21`, `7.21.1` and ignores pre-release suffixes
    /// (`7.21.1-rc1`).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Unsupported {
            found: s.to_string(),
            required: MIN_SCOPED_TOKEN_VERSION.to_string(),
        };
        let core = s.trim().split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.').map(|p| p.parse::<u32>().map_err(|_| invalid()));

        let major = parts.next().ok_or_else(invalid)??;
        let minor = parts.next().transpose()?.unwrap_or(0);
        let patch = parts.next().transpose()?.unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(version: &str) -> ServiceVersion {
        ServiceVersion {
            version: version.to_string(),
            revision: None,
        }
    }

    #[test]
    fn parses_partial_and_suffixed_versions() {
        assert_eq!("7".parse::<Version>().unwrap(), Version::new(7, 0, 0));
        assert_eq!("7.41".parse::<Version>().unwrap(), Version::new(7, 41, 0));
        assert_eq!("7.21.1-rc1".parse::<Version>().unwrap(), Version::new(7, 21, 1));
    }

    #[test]
    fn compares_numerically_not_lexically() {
        assert!("7.100.0".parse::<Version>().unwrap() > "7.21.1".parse::<Version>().unwrap());
    }

    #[test]
    fn old_release_is_unsupported() {
        // GIVEN: a release from before scoped tokens
        let result = service("7.19.10").require_scoped_tokens();

        // THEN: the version check refuses it
        match result {
            Err(Error::Unsupported { found, required }) => {
                assert_eq!(found, "7.19.10");
                assert_eq!(required, "7.21.1");
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn minimum_release_is_supported() {
        assert!(service("7.21.1").require_scoped_tokens().is_ok());
        assert!(service("7.77.3").require_scoped_tokens().is_ok());
    }

    #[test]
    fn garbage_version_is_unsupported() {
        assert!(matches!("seven".parse::<Version>(), Err(Error::Unsupported { .. })));
        assert!("7.x.1".parse::<Version>().is_err());
    }
}
