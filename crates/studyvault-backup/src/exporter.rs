//! Snapshot export.

use std::time::Instant;

use chrono::Local;
use tracing::{debug, info, trace, warn};

use studyvault_core::{
    BackupStore, DatabaseSnapshot, EntityKind, EntityRow, Error, FieldMap, Result, Scope,
    Snapshot, SnapshotTables, StoreTransaction, UserSnapshot, CURRENT_SNAPSHOT_VERSION,
};

/// Read every row in `scope` into a snapshot document.
///
/// All reads share one read-only transaction so the snapshot is consistent.
/// Any row that cannot be read or flattened aborts the export.
pub async fn export(store: &dyn BackupStore, scope: Scope) -> Result<Snapshot> {
    let start = Instant::now();
    let mut tx = store.begin_read().await?;
    let outcome = collect(tx.as_mut(), scope).await;
    if let Err(e) = tx.rollback().await {
        warn!(subsystem = "backup", component = "exporter", error = %e, "Failed to close read transaction");
    }
    let snapshot = outcome?;

    let rows: usize = snapshot.counts().iter().map(|(_, n)| n).sum();
    info!(
        subsystem = "backup",
        component = "exporter",
        op = "export",
        scope = %scope,
        row_count = rows,
        duration_ms = start.elapsed().as_millis() as u64,
        "Snapshot exported"
    );
    Ok(snapshot)
}

async fn collect(tx: &mut dyn StoreTransaction, scope: Scope) -> Result<Snapshot> {
    let owner = match scope {
        Scope::All => None,
        Scope::User(user_id) => Some(
            tx.find_user(user_id)
                .await?
                .ok_or(Error::UserNotFound(user_id))?,
        ),
    };

    let mut tables = SnapshotTables::default();
    for kind in EntityKind::owned() {
        let maps = fetch_maps(tx, kind, scope).await?;
        if let Some(slot) = tables.rows_mut(kind) {
            *slot = maps;
        }
    }

    let backup_timestamp = Local::now().naive_local();
    let version = CURRENT_SNAPSHOT_VERSION.to_string();

    let snapshot = match owner {
        None => Snapshot::Database(DatabaseSnapshot {
            backup_timestamp,
            version,
            users: fetch_maps(tx, EntityKind::User, Scope::All).await?,
            tables,
        }),
        Some(user) => Snapshot::User(UserSnapshot {
            backup_timestamp,
            version,
            user_id: user.id,
            user: Some(EntityRow::User(user).to_field_map()?),
            tables,
        }),
    };
    Ok(snapshot)
}

async fn fetch_maps(
    tx: &mut dyn StoreTransaction,
    kind: EntityKind,
    scope: Scope,
) -> Result<Vec<FieldMap>> {
    let rows = tx.fetch_rows(kind, scope).await?;
    debug!(
        subsystem = "backup",
        component = "exporter",
        entity_kind = %kind,
        row_count = rows.len(),
        "Exporting kind"
    );
    rows.iter()
        .map(|row| {
            trace!(entity_kind = %kind, original_id = row.id(), "Flattening row");
            row.to_field_map()
        })
        .collect()
}
