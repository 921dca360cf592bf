//! Snapshot format versioning.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::defaults::SNAPSHOT_VERSION;

/// Current snapshot format version.
pub const CURRENT_SNAPSHOT_VERSION: &str = SNAPSHOT_VERSION;

/// Version of the snapshot format, `major.minor` with an optional patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Parse a version string ("1.0" or "1.0.3"). A missing patch reads as 0.
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(format!("Invalid version format: {}", s));
        }

        let major = parts[0]
            .parse::<u64>()
            .map_err(|_| format!("Invalid major version: {}", parts[0]))?;
        let minor = parts[1]
            .parse::<u64>()
            .map_err(|_| format!("Invalid minor version: {}", parts[1]))?;
        let patch = match parts.get(2) {
            Some(p) => p
                .parse::<u64>()
                .map_err(|_| format!("Invalid patch version: {}", p))?,
            None => 0,
        };

        Ok(Version {
            major,
            minor,
            patch,
        })
    }

    /// The version written by this build.
    pub fn current() -> Self {
        Self::parse(CURRENT_SNAPSHOT_VERSION).unwrap_or(Version {
            major: 1,
            minor: 0,
            patch: 0,
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}
