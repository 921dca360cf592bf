//! Snapshot files on disk: naming, validation, listing and retention.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use studyvault_backup::{BackupConfig, BackupService};
use studyvault_core::{EntityKind, Error, SnapshotKind, SnapshotName};
use studyvault_db::test_fixtures::{scenario_graph, two_user_graph};
use studyvault_db::MemoryStore;

async fn service_with(rows: Vec<studyvault_core::EntityRow>, dir: &Path) -> (MemoryStore, BackupService) {
    let store = MemoryStore::new();
    store.seed(rows).await.expect("Failed to seed store");
    let service = BackupService::new(
        Arc::new(store.clone()),
        BackupConfig::default().with_backup_dir(dir),
    );
    (store, service)
}

fn write_aged(dir: &Path, name: &str, body: &str, age_secs: u64) {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write");
    let file = std::fs::File::options()
        .write(true)
        .open(&path)
        .expect("open");
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .expect("set_modified");
}

#[tokio::test]
async fn test_created_backups_follow_naming_contract() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, service) = service_with(two_user_graph(), tmp.path()).await;

    let full = service.create_backup().await.expect("create");
    let user = service.create_user_backup(2).await.expect("create user");

    let full_name = full.file_name().and_then(|n| n.to_str()).expect("name");
    let user_name = user.file_name().and_then(|n| n.to_str()).expect("name");
    assert_eq!(
        SnapshotName::parse(full_name, "json").map(|n| n.kind),
        Some(SnapshotKind::Full)
    );
    assert_eq!(
        SnapshotName::parse(user_name, "json").map(|n| n.kind),
        Some(SnapshotKind::User { user_id: 2 })
    );

    let listed = service.list_backups().await.expect("list");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|info| info.size_bytes > 0));
}

#[tokio::test]
async fn test_validation_is_read_only_and_repeatable() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (store, service) = service_with(scenario_graph(), tmp.path()).await;
    let path = service.create_backup().await.expect("create");
    let bytes_before = std::fs::read(&path).expect("read");

    let first = service.validate_backup(&path).await.expect("validate");
    let second = service.validate_backup(&path).await.expect("validate");

    assert!(first.valid, "{:?}", first.errors);
    assert_eq!(first, second);
    assert_eq!(first.version.as_deref(), Some("1.0"));
    assert_eq!(std::fs::read(&path).expect("read"), bytes_before);
    assert_eq!(store.count(EntityKind::QuizAnswer).await, 4);
}

#[tokio::test]
async fn test_validation_reports_missing_quiz_id() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, service) = service_with(Vec::new(), tmp.path()).await;
    let name = "backup_2026-05-01_08-00-00.json";
    write_aged(
        tmp.path(),
        name,
        r#"{
            "backupTimestamp": "2026-05-01T08:00:00",
            "version": "1.0",
            "quizQuestions": [{"id": 1, "questionText": "Where is my quiz?"}]
        }"#,
        0,
    );

    let report = service
        .validate_backup(&tmp.path().join(name))
        .await
        .expect("validate");
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("quizId"), "{}", report.errors[0]);
}

#[tokio::test]
async fn test_validation_of_garbage_and_missing_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, service) = service_with(Vec::new(), tmp.path()).await;
    write_aged(tmp.path(), "backup_2026-05-01_08-00-00.json", "{ truncated", 0);

    let report = service
        .validate_backup(&tmp.path().join("backup_2026-05-01_08-00-00.json"))
        .await
        .expect("validate");
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert!(report.timestamp.is_none());

    let err = service
        .validate_backup(&tmp.path().join("backup_2026-05-02_08-00-00.json"))
        .await
        .expect_err("missing file");
    match err {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("Expected Io error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cleanup_deletes_exactly_the_oldest() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, service) = service_with(Vec::new(), tmp.path()).await;
    for day in 1..=6u64 {
        write_aged(
            tmp.path(),
            &format!("backup_2026-03-0{}_02-00-00.json", day),
            "{}",
            (7 - day) * 3600,
        );
    }

    assert_eq!(service.cleanup_old_backups(10).await.expect("cleanup"), 0);
    assert_eq!(service.cleanup_old_backups(6).await.expect("cleanup"), 0);
    assert_eq!(service.cleanup_old_backups(4).await.expect("cleanup"), 2);

    let names: Vec<String> = service
        .list_backups()
        .await
        .expect("list")
        .into_iter()
        .map(|info| info.file_name)
        .collect();
    assert_eq!(
        names,
        vec![
            "backup_2026-03-06_02-00-00.json",
            "backup_2026-03-05_02-00-00.json",
            "backup_2026-03-04_02-00-00.json",
            "backup_2026-03-03_02-00-00.json",
        ]
    );
}

#[tokio::test]
async fn test_delete_and_stats() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, service) = service_with(Vec::new(), tmp.path()).await;
    write_aged(tmp.path(), "backup_2026-03-01_02-00-00.json", "{}", 7200);
    write_aged(tmp.path(), "user_backup_5_2026-03-02_02-00-00.json", "{ }", 60);

    let stats = service.backup_stats().await.expect("stats");
    assert_eq!(stats.backup_count, 2);
    assert_eq!(stats.total_size_bytes, 5);
    assert!(stats.oldest < stats.newest);

    let err = service
        .delete_backup("../backup_2026-03-01_02-00-00.json")
        .await
        .expect_err("traversal");
    assert!(matches!(err, Error::InvalidInput(_)));

    service
        .delete_backup("backup_2026-03-01_02-00-00.json")
        .await
        .expect("delete");
    let stats = service.backup_stats().await.expect("stats");
    assert_eq!(stats.backup_count, 1);
    assert_eq!(stats.oldest, stats.newest);
}
