//! Command implementations. Each returns the JSON document printed on stdout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use studyvault_backup::{files, restore, retention, BackupConfig, BackupService, RestoreMode};
use studyvault_core::{validate_bytes, Snapshot, ValidationReport};
use studyvault_db::{MemoryStore, PgBackupStore, PoolConfig};
use studyvault_jobs::{BackupScheduler, ScheduleConfig};

/// Database connection settings shared by every command that touches the store.
#[derive(Debug, Clone)]
pub struct Connection {
    pub database_url: String,
    pub pool: PoolConfig,
}

impl Connection {
    /// Pool settings left unset keep their defaults.
    pub fn new(
        database_url: String,
        max_connections: Option<u32>,
        connect_timeout_secs: Option<u64>,
    ) -> Self {
        let mut pool = PoolConfig::new();
        if let Some(max) = max_connections {
            pool = pool.max_connections(max);
        }
        if let Some(secs) = connect_timeout_secs {
            pool = pool.acquire_timeout(Duration::from_secs(secs));
        }
        Self { database_url, pool }
    }

    pub async fn store(&self) -> Result<PgBackupStore> {
        PgBackupStore::connect_with_config(&self.database_url, self.pool.clone())
            .await
            .context("Failed to connect to database")
    }

    async fn service(&self, config: &BackupConfig) -> Result<BackupService> {
        Ok(BackupService::new(
            Arc::new(self.store().await?),
            config.clone(),
        ))
    }
}

pub async fn create(conn: &Connection, config: &BackupConfig) -> Result<Value> {
    let path = conn.service(config).await?.create_backup().await?;
    Ok(json!({ "path": path }))
}

pub async fn create_user(conn: &Connection, config: &BackupConfig, user_id: i64) -> Result<Value> {
    let path = conn
        .service(config)
        .await?
        .create_user_backup(user_id)
        .await?;
    Ok(json!({ "path": path, "userId": user_id }))
}

pub async fn list(config: &BackupConfig) -> Result<Value> {
    let backups = retention::list_snapshots(&config.backup_dir, &config.file_extension).await?;
    Ok(serde_json::to_value(backups)?)
}

pub async fn stats(config: &BackupConfig) -> Result<Value> {
    let stats = retention::stats(&config.backup_dir, &config.file_extension).await?;
    Ok(serde_json::to_value(stats)?)
}

pub async fn cleanup(config: &BackupConfig, keep: usize) -> Result<Value> {
    let deleted = retention::cleanup(&config.backup_dir, &config.file_extension, keep).await?;
    Ok(json!({ "deleted": deleted, "kept": keep }))
}

pub async fn delete(config: &BackupConfig, file_name: &str) -> Result<Value> {
    retention::delete(&config.backup_dir, &config.file_extension, file_name).await?;
    Ok(json!({ "deleted": file_name }))
}

pub async fn validate(path: &Path) -> Result<ValidationReport> {
    let bytes = files::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(validate_bytes(&bytes))
}

/// Restore a snapshot file, either for real or into an empty in-memory store.
pub async fn recover(
    conn: &Connection,
    config: &BackupConfig,
    path: &Path,
    mode: RestoreMode,
    dry_run: bool,
) -> Result<Value> {
    if dry_run {
        return preview(path, mode).await;
    }
    let service = conn.service(config).await?;
    let result = match mode {
        RestoreMode::FullReplace => service.recover_from_backup(path).await?,
        RestoreMode::UserMerge { target_user_id } => {
            service.recover_user_from_backup(path, target_user_id).await?
        }
    };
    Ok(serde_json::to_value(result)?)
}

/// Run the restore against a scratch store and report what it would do.
pub async fn preview(path: &Path, mode: RestoreMode) -> Result<Value> {
    let bytes = files::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = Snapshot::from_slice(&bytes)?;
    let store = MemoryStore::new();
    let result = restore(&store, &snapshot, mode).await?;
    info!(
        subsystem = "cli",
        op = "dry_run",
        mode = %mode,
        row_count = result.total_restored(),
        "Dry run finished, nothing written"
    );
    Ok(json!({ "dryRun": true, "result": result }))
}

pub async fn migrate(conn: &Connection) -> Result<Value> {
    conn.store().await?.migrate().await?;
    Ok(json!({ "migrated": true }))
}

pub async fn schedule_status(
    conn: &Connection,
    config: &BackupConfig,
    schedule: ScheduleConfig,
) -> Result<Value> {
    let scheduler = BackupScheduler::new(conn.service(config).await?, schedule);
    Ok(serde_json::to_value(scheduler.status().await?)?)
}

pub async fn schedule_trigger(
    conn: &Connection,
    config: &BackupConfig,
    schedule: ScheduleConfig,
) -> Result<Value> {
    let scheduler = BackupScheduler::new(conn.service(config).await?, schedule);
    let path = scheduler.trigger_backup().await?;
    Ok(json!({ "path": path }))
}

/// Run the scheduler until Ctrl-C.
pub async fn schedule_run(
    conn: &Connection,
    config: &BackupConfig,
    schedule: ScheduleConfig,
) -> Result<Value> {
    let scheduler = BackupScheduler::new(conn.service(config).await?, schedule);
    let status = scheduler.status().await?;
    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!(subsystem = "cli", "Shutdown requested");
    handle.shutdown().await?;
    handle.join().await?;
    Ok(serde_json::to_value(status)?)
}
