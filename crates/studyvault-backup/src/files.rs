//! Snapshot file I/O.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use studyvault_core::{Error, Result};

/// Write `data` to `dir/file_name` so the final name never shows a partial file.
///
/// The bytes go to a hidden temp file in the same directory and are synced to
/// disk. The temp file is then hard-linked under the final name, which fails
/// when that name exists, so an existing snapshot is never replaced.
pub async fn write_atomic(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).await.map_err(|e| {
        warn!(dir = %dir.display(), error = %e, "files: create_dir_all failed");
        e
    })?;

    let final_path = dir.join(file_name);
    let temp_path = dir.join(format!(".{}.tmp", file_name));
    debug!(file_path = %final_path.display(), size = data.len(), "files: write");

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(Error::InvalidInput(format!(
                "snapshot {} is already being written",
                file_name
            )));
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let result = async {
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::hard_link(&temp_path, &final_path).await
    }
    .await;

    if let Err(e) = fs::remove_file(&temp_path).await {
        warn!(temp_path = %temp_path.display(), error = %e, "files: temp file not removed");
    }

    match result {
        Ok(()) => Ok(final_path),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::InvalidInput(format!(
            "snapshot {} already exists",
            file_name
        ))),
        Err(e) => {
            warn!(file_path = %final_path.display(), error = %e, "files: atomic write failed");
            Err(Error::Io(e))
        }
    }
}

/// Read a whole snapshot file.
pub async fn read(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_creates_dir_and_leaves_no_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("backups");

        let path = write_atomic(&dir, "backup_x.json", b"{}").await.unwrap();
        assert_eq!(path, dir.join("backup_x.json"));
        assert_eq!(read(&path).await.unwrap(), b"{}");

        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["backup_x.json".to_string()]);
    }

    #[tokio::test]
    async fn test_write_atomic_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        write_atomic(tmp.path(), "a.json", b"1").await.unwrap();
        let err = write_atomic(tmp.path(), "a.json", b"2").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(read(&tmp.path().join("a.json")).await.unwrap(), b"1");
        assert!(!tmp.path().join(".a.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_keeps_file_created_by_another_writer() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.json"), b"other").unwrap();

        let err = write_atomic(tmp.path(), "b.json", b"mine").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(read(&tmp.path().join("b.json")).await.unwrap(), b"other");
        assert!(!tmp.path().join(".b.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_refuses_while_same_name_in_flight() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".c.json.tmp"), b"partial").unwrap();

        let err = write_atomic(tmp.path(), "c.json", b"{}").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!tmp.path().join("c.json").exists());
        assert_eq!(std::fs::read(tmp.path().join(".c.json.tmp")).unwrap(), b"partial");
    }

    #[tokio::test]
    async fn test_read_missing_file_keeps_io_source() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read(&tmp.path().join("missing.json")).await.unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_into_file_path_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let err = write_atomic(&blocker, "a.json", b"{}").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
