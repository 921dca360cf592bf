//! Snapshot version compatibility checking.

use super::version::{Version, CURRENT_SNAPSHOT_VERSION};

/// Result of checking a snapshot's version against this build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityResult {
    /// Same major version, not newer than this build.
    Compatible,

    /// Same major version from a newer minor. Readable, with warnings.
    NewerMinor { warnings: Vec<String> },

    /// Different major version or unparseable version string.
    Incompatible { reason: String },
}

impl CompatibilityResult {
    pub fn is_importable(&self) -> bool {
        !matches!(self, Self::Incompatible { .. })
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::NewerMinor { warnings } => warnings,
            _ => &[],
        }
    }
}

/// Check whether a snapshot written as `snapshot_version` can be restored.
pub fn check_snapshot_compatibility(snapshot_version: &str) -> CompatibilityResult {
    let current = Version::current();

    let snapshot = match Version::parse(snapshot_version) {
        Ok(v) => v,
        Err(e) => {
            return CompatibilityResult::Incompatible {
                reason: format!("Invalid snapshot version: {}", e),
            }
        }
    };

    if current.major != snapshot.major {
        return CompatibilityResult::Incompatible {
            reason: format!(
                "Snapshot major version {} is incompatible with current major version {}",
                snapshot.major, current.major
            ),
        };
    }

    if snapshot.minor > current.minor {
        return CompatibilityResult::NewerMinor {
            warnings: vec![format!(
                "Snapshot was created with a newer format version ({}) than current ({}); unknown fields are ignored",
                snapshot_version, CURRENT_SNAPSHOT_VERSION
            )],
        };
    }

    CompatibilityResult::Compatible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_version_compatible() {
        assert_eq!(
            check_snapshot_compatibility(CURRENT_SNAPSHOT_VERSION),
            CompatibilityResult::Compatible
        );
        assert_eq!(
            check_snapshot_compatibility("1.0.0"),
            CompatibilityResult::Compatible
        );
    }

    #[test]
    fn test_newer_patch_compatible() {
        assert_eq!(
            check_snapshot_compatibility("1.0.7"),
            CompatibilityResult::Compatible
        );
    }

    #[test]
    fn test_newer_minor_warns() {
        let result = check_snapshot_compatibility("1.4");
        assert!(result.is_importable());
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].contains("1.4"));
    }

    #[test]
    fn test_different_major_incompatible() {
        match check_snapshot_compatibility("2.0") {
            CompatibilityResult::Incompatible { reason } => {
                assert!(reason.contains("major version 2"));
            }
            other => panic!("Expected Incompatible, got {:?}", other),
        }
        assert!(!check_snapshot_compatibility("0.9").is_importable());
    }

    #[test]
    fn test_invalid_version_incompatible() {
        match check_snapshot_compatibility("latest") {
            CompatibilityResult::Incompatible { reason } => {
                assert!(reason.contains("Invalid snapshot version"));
            }
            other => panic!("Expected Incompatible, got {:?}", other),
        }
    }
}
