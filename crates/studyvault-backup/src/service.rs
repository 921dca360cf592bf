//! File-level backup operations over a store and a backup directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use studyvault_core::{
    validate_bytes, validate_snapshot, BackupStore, Error, Result, Scope, Snapshot, SnapshotName,
    ValidationReport,
};

use crate::config::BackupConfig;
use crate::importer::{restore, RecoveryResult, RestoreMode};
use crate::retention::{self, BackupFileInfo, BackupStats};
use crate::{exporter, files};

/// Creates, lists, validates, restores and prunes snapshot files.
#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn BackupStore>,
    config: BackupConfig,
}

impl BackupService {
    pub fn new(store: Arc<dyn BackupStore>, config: BackupConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BackupStore> {
        &self.store
    }

    /// Export the whole database to a new `backup_<timestamp>` file.
    pub async fn create_backup(&self) -> Result<PathBuf> {
        let snapshot = exporter::export(self.store.as_ref(), Scope::All).await?;
        let name = SnapshotName::full(snapshot.backup_timestamp());
        self.write(&snapshot, name).await
    }

    /// Export one user's data to a new `user_backup_<id>_<timestamp>` file.
    pub async fn create_user_backup(&self, user_id: i64) -> Result<PathBuf> {
        let snapshot = exporter::export(self.store.as_ref(), Scope::User(user_id)).await?;
        let name = SnapshotName::user(user_id, snapshot.backup_timestamp());
        self.write(&snapshot, name).await
    }

    async fn write(&self, snapshot: &Snapshot, name: SnapshotName) -> Result<PathBuf> {
        let bytes = snapshot.to_vec_pretty()?;
        let file_name = name.file_name(&self.config.file_extension);
        let path = files::write_atomic(&self.config.backup_dir, &file_name, &bytes).await?;
        info!(
            subsystem = "backup",
            component = "service",
            op = "create",
            file_path = %path.display(),
            size_bytes = bytes.len(),
            "Backup written"
        );
        Ok(path)
    }

    /// Snapshot files, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupFileInfo>> {
        retention::list_snapshots(&self.config.backup_dir, &self.config.file_extension).await
    }

    /// Keep the `keep_count` newest snapshot files, delete the rest.
    pub async fn cleanup_old_backups(&self, keep_count: usize) -> Result<usize> {
        retention::cleanup(
            &self.config.backup_dir,
            &self.config.file_extension,
            keep_count,
        )
        .await
    }

    pub async fn delete_backup(&self, file_name: &str) -> Result<()> {
        retention::delete(&self.config.backup_dir, &self.config.file_extension, file_name).await
    }

    pub async fn backup_stats(&self) -> Result<BackupStats> {
        retention::stats(&self.config.backup_dir, &self.config.file_extension).await
    }

    /// Check a snapshot file without touching the store.
    ///
    /// A file that cannot be read is an error; a file that cannot be parsed is
    /// an invalid report.
    pub async fn validate_backup(&self, path: &Path) -> Result<ValidationReport> {
        let bytes = files::read(path).await?;
        let report = validate_bytes(&bytes);
        info!(
            subsystem = "backup",
            component = "service",
            op = "validate",
            file_path = %path.display(),
            valid = report.valid,
            error_count = report.errors.len(),
            "Backup validated"
        );
        Ok(report)
    }

    /// Replace the whole database with the contents of a snapshot file.
    pub async fn recover_from_backup(&self, path: &Path) -> Result<RecoveryResult> {
        let snapshot = self.load(path).await?;
        restore(self.store.as_ref(), &snapshot, RestoreMode::FullReplace).await
    }

    /// Replace one user's data with a single-user snapshot file.
    pub async fn recover_user_from_backup(
        &self,
        path: &Path,
        target_user_id: i64,
    ) -> Result<RecoveryResult> {
        let snapshot = self.load(path).await?;
        restore(
            self.store.as_ref(),
            &snapshot,
            RestoreMode::UserMerge { target_user_id },
        )
        .await
    }

    /// Validate an uploaded snapshot and, if it is valid, restore it in full.
    ///
    /// Nothing is written to the backup directory.
    pub async fn recover_from_upload(&self, bytes: &[u8]) -> Result<RecoveryResult> {
        let snapshot = match Snapshot::from_slice(bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return Err(Error::InvalidSnapshot(vec![format!(
                    "Failed to parse snapshot: {}",
                    e
                )]))
            }
        };
        let report = validate_snapshot(&snapshot);
        if !report.valid {
            warn!(
                subsystem = "backup",
                component = "service",
                op = "recover_upload",
                error_count = report.errors.len(),
                "Uploaded snapshot rejected"
            );
            return Err(Error::InvalidSnapshot(report.errors));
        }
        restore(self.store.as_ref(), &snapshot, RestoreMode::FullReplace).await
    }

    async fn load(&self, path: &Path) -> Result<Snapshot> {
        let bytes = files::read(path).await?;
        Snapshot::from_slice(&bytes).map_err(|e| {
            Error::InvalidSnapshot(vec![format!("Failed to parse snapshot: {}", e)])
        })
    }
}
