//! Backup engine configuration.

use std::env;
use std::path::PathBuf;

use studyvault_core::defaults::{BACKUP_DIR, SNAPSHOT_EXTENSION};

/// Where snapshot files live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    /// Directory holding snapshot files. Created on first write.
    pub backup_dir: PathBuf,
    /// Snapshot file extension without the dot.
    pub file_extension: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(BACKUP_DIR),
            file_extension: SNAPSHOT_EXTENSION.to_string(),
        }
    }
}

impl BackupConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BACKUP_DIR` | `backups` |
    pub fn from_env() -> Self {
        let backup_dir = env::var("BACKUP_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(BACKUP_DIR));

        Self {
            backup_dir,
            ..Self::default()
        }
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into().trim_start_matches('.').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BackupConfig::default();
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.file_extension, "json");
    }

    #[test]
    fn test_builders() {
        let config = BackupConfig::default()
            .with_backup_dir("/var/lib/studyvault")
            .with_file_extension(".snap");
        assert_eq!(config.backup_dir, PathBuf::from("/var/lib/studyvault"));
        assert_eq!(config.file_extension, "snap");
    }
}
