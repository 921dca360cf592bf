//! Snapshot listing, statistics, deletion and retention.
//!
//! Only files matching the naming contract count as snapshots. Anything else
//! in the backup directory, including in-flight temp files, is ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use studyvault_core::{Error, Result, SnapshotKind, SnapshotName};

/// A snapshot file found in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFileInfo {
    pub file_name: String,
    pub file_path: PathBuf,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
    pub kind: SnapshotKind,
}

/// Aggregate figures over all snapshot files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    pub backup_count: usize,
    pub total_size_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Snapshot files in `dir`, newest first; ties broken by name, descending.
///
/// A missing directory yields an empty list.
pub async fn list_snapshots(dir: &Path, extension: &str) -> Result<Vec<BackupFileInfo>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        let Some(name) = SnapshotName::parse(&file_name, extension) else {
            continue;
        };
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        found.push(BackupFileInfo {
            file_path: entry.path(),
            last_modified: DateTime::<Utc>::from(metadata.modified()?),
            size_bytes: metadata.len(),
            kind: name.kind,
            file_name,
        });
    }

    found.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| b.file_name.cmp(&a.file_name))
    });
    Ok(found)
}

/// Delete every snapshot but the `keep_count` newest. Returns how many went.
///
/// A file that fails to delete is logged and skipped.
pub async fn cleanup(dir: &Path, extension: &str, keep_count: usize) -> Result<usize> {
    let snapshots = list_snapshots(dir, extension).await?;
    let mut deleted = 0;

    for info in snapshots.iter().skip(keep_count) {
        match fs::remove_file(&info.file_path).await {
            Ok(()) => {
                debug!(file_path = %info.file_path.display(), "Deleted old snapshot");
                deleted += 1;
            }
            Err(e) => {
                warn!(
                    subsystem = "backup",
                    component = "retention",
                    file_path = %info.file_path.display(),
                    error = %e,
                    "Failed to delete old snapshot, skipping"
                );
            }
        }
    }

    info!(
        subsystem = "backup",
        component = "retention",
        op = "cleanup",
        file_count = deleted,
        keep_count,
        "Snapshot cleanup finished"
    );
    Ok(deleted)
}

/// Delete one snapshot by file name.
///
/// The name must be a bare snapshot file name: path separators, `..` and
/// names outside the naming contract are rejected.
pub async fn delete(dir: &Path, extension: &str, file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.contains("..")
    {
        return Err(Error::InvalidInput(format!(
            "invalid snapshot file name: {}",
            file_name
        )));
    }
    if SnapshotName::parse(file_name, extension).is_none() {
        return Err(Error::InvalidInput(format!(
            "not a snapshot file name: {}",
            file_name
        )));
    }

    let path = dir.join(file_name);
    match fs::remove_file(&path).await {
        Ok(()) => {
            info!(
                subsystem = "backup",
                component = "retention",
                op = "delete",
                file_path = %path.display(),
                "Deleted snapshot"
            );
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::NotFound(format!("snapshot {}", file_name)))
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Count, total size, and modification-time range of all snapshots.
pub async fn stats(dir: &Path, extension: &str) -> Result<BackupStats> {
    let snapshots = list_snapshots(dir, extension).await?;
    Ok(BackupStats {
        backup_count: snapshots.len(),
        total_size_bytes: snapshots.iter().map(|s| s.size_bytes).sum(),
        newest: snapshots.first().map(|s| s.last_modified),
        oldest: snapshots.last().map(|s| s.last_modified),
    })
}
