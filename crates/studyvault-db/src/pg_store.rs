//! PostgreSQL implementation of the backup store.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, trace};

use studyvault_core::{
    BackupStore, EntityKind, EntityRow, Error, Result, Scope, StoreTransaction, User,
};

use crate::pool::PoolConfig;
use crate::rows;

/// Backup store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgBackupStore {
    pool: PgPool,
}

impl PgBackupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let start = Instant::now();
        let pool = config
            .options()
            .connect(url)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "db",
            component = "pg_store",
            op = "connect",
            max_connections = config.max_connections,
            pool_size = pool.size(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}

#[async_trait]
impl BackupStore for PgBackupStore {
    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        debug!(subsystem = "db", component = "pg_store", op = "begin_read", "Opened snapshot transaction");
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn begin_write(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        debug!(subsystem = "db", component = "pg_store", op = "begin_write", "Opened restore transaction");
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

/// Open PostgreSQL transaction. Row writes run inside a savepoint each.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTransaction {
    async fn savepoint(&mut self) -> Result<()> {
        sqlx::query("SAVEPOINT studyvault_row")
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Release the row savepoint on success, roll back to it on failure.
    async fn settle<T: Send>(&mut self, outcome: std::result::Result<T, sqlx::Error>) -> Result<T> {
        match outcome {
            Ok(value) => {
                sqlx::query("RELEASE SAVEPOINT studyvault_row")
                    .execute(&mut *self.tx)
                    .await
                    .map_err(Error::Database)?;
                Ok(value)
            }
            Err(e) => {
                sqlx::query("ROLLBACK TO SAVEPOINT studyvault_row")
                    .execute(&mut *self.tx)
                    .await
                    .map_err(Error::Database)?;
                Err(Error::Database(e))
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn fetch_rows(&mut self, kind: EntityKind, scope: Scope) -> Result<Vec<EntityRow>> {
        let sql = rows::select_sql(kind, scope);
        let mut query = sqlx::query(&sql);
        if let Scope::User(user_id) = scope {
            query = query.bind(user_id);
        }
        let pg_rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        trace!(
            subsystem = "db",
            component = "pg_store",
            entity_kind = %kind,
            row_count = pg_rows.len(),
            "Fetched rows"
        );
        pg_rows.iter().map(|r| rows::decode_row(kind, r)).collect()
    }

    async fn find_user(&mut self, id: i64) -> Result<Option<User>> {
        let sql = rows::select_sql(EntityKind::User, Scope::User(id));
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(rows::decode_user).transpose()
    }

    async fn delete_rows(&mut self, kind: EntityKind, scope: Scope) -> Result<u64> {
        let sql = rows::delete_sql(kind, scope);
        let mut query = sqlx::query(&sql);
        if let Scope::User(user_id) = scope {
            query = query.bind(user_id);
        }
        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn insert_with_id(&mut self, row: &EntityRow) -> Result<()> {
        let sql = rows::insert_sql(row.kind(), true);
        self.savepoint().await?;
        let outcome = rows::bind_columns(sqlx::query(&sql).bind(row.id()), row)
            .execute(&mut *self.tx)
            .await
            .map(|_| ());
        self.settle(outcome).await
    }

    async fn insert(&mut self, row: &EntityRow) -> Result<i64> {
        let sql = rows::insert_sql(row.kind(), false);
        self.savepoint().await?;
        // Explicit-id inserts do not advance the sequence.
        let aligned = sqlx::query(&rows::sync_identity_sql(row.kind()))
            .execute(&mut *self.tx)
            .await;
        let outcome = match aligned {
            Ok(_) => rows::bind_columns(sqlx::query(&sql), row)
                .fetch_one(&mut *self.tx)
                .await
                .and_then(|r| r.try_get::<i64, _>("id")),
            Err(e) => Err(e),
        };
        self.settle(outcome).await
    }

    async fn update_row(&mut self, row: &EntityRow) -> Result<()> {
        let sql = rows::update_sql(row.kind());
        self.savepoint().await?;
        let outcome = rows::bind_columns(sqlx::query(&sql).bind(row.id()), row)
            .execute(&mut *self.tx)
            .await
            .map(|done| done.rows_affected());
        match self.settle(outcome).await? {
            0 => Err(Error::NotFound(format!(
                "{} {}",
                row.kind().label(),
                row.id()
            ))),
            _ => Ok(()),
        }
    }

    async fn upsert_user(&mut self, user: &User) -> Result<()> {
        let sql = rows::upsert_user_sql();
        let row = EntityRow::User(user.clone());
        self.savepoint().await?;
        let outcome = rows::bind_columns(sqlx::query(&sql).bind(user.id), &row)
            .execute(&mut *self.tx)
            .await
            .map(|_| ());
        self.settle(outcome).await
    }

    async fn sync_identity(&mut self, kind: EntityKind) -> Result<()> {
        sqlx::query(&rows::sync_identity_sql(kind))
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(Error::Database)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(Error::Database)
    }
}
