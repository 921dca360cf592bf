//! Storage seam between the backup engine and a concrete database.
//!
//! The engine only ever talks to a [`StoreTransaction`]: exports read through
//! one read-consistent transaction, restores clear and insert through one
//! write transaction that commits or rolls back as a whole.

use async_trait::async_trait;

use crate::error::Result;
use crate::kinds::{EntityKind, Scope};
use crate::models::{EntityRow, User};

/// A database the backup engine can export from and restore into.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Open a read-only transaction with a stable view of every table.
    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Open a read-write transaction.
    async fn begin_write(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// An open transaction against a [`BackupStore`].
///
/// Row-level operations (`insert*`, `upsert_user`) are isolated: when one
/// fails, its partial effects are undone and the transaction stays usable.
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Rows of `kind` within `scope`, ordered by identity.
    ///
    /// For `Scope::User(id)` ownership is transitive: questions through their
    /// quiz, answers through question and quiz, attempt answers through their
    /// attempt, study sessions through their flashcard.
    async fn fetch_rows(&mut self, kind: EntityKind, scope: Scope) -> Result<Vec<EntityRow>>;

    /// Look up a single user.
    async fn find_user(&mut self, id: i64) -> Result<Option<User>>;

    /// Delete rows of `kind` within `scope`. Returns the number deleted.
    async fn delete_rows(&mut self, kind: EntityKind, scope: Scope) -> Result<u64>;

    /// Insert a row keeping its own identity.
    async fn insert_with_id(&mut self, row: &EntityRow) -> Result<()>;

    /// Insert a row with a store-assigned identity, ignoring `row.id()`.
    ///
    /// The identity generator is first moved past the highest id in use, so
    /// rows inserted earlier with explicit ids never collide with the new one.
    async fn insert(&mut self, row: &EntityRow) -> Result<i64>;

    /// Overwrite every column of the existing row with `row.id()`.
    async fn update_row(&mut self, row: &EntityRow) -> Result<()>;

    /// Overwrite the user with `user.id` in place, or insert it with that id.
    async fn upsert_user(&mut self, user: &User) -> Result<()>;

    /// Move the identity generator of `kind` past the highest id in use.
    async fn sync_identity(&mut self, kind: EntityKind) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
