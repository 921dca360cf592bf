//! In-memory backup store.
//!
//! Mirrors the relational rules of the PostgreSQL schema closely enough for
//! tests and dry runs: unique user emails, foreign keys that must resolve at
//! insert time, `ON DELETE SET NULL` on every relation, and transactions that
//! either commit as a whole or leave the store untouched.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use studyvault_core::{
    BackupStore, EntityKind, EntityRow, Error, Result, Scope, StoreTransaction, User,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<EntityKind, BTreeMap<i64, EntityRow>>,
    /// Next identity per kind, mirroring a sequence.
    sequences: BTreeMap<EntityKind, i64>,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> Option<&BTreeMap<i64, EntityRow>> {
        self.rows.get(&kind)
    }

    fn exists(&self, kind: EntityKind, id: i64) -> bool {
        self.table(kind).is_some_and(|t| t.contains_key(&id))
    }

    fn get(&self, kind: EntityKind, id: i64) -> Option<&EntityRow> {
        self.table(kind).and_then(|t| t.get(&id))
    }

    /// Follow `parent` on `row` and return the referenced row, if any.
    fn parent_of(&self, row: &EntityRow, parent: EntityKind) -> Option<&EntityRow> {
        row.relations()
            .into_iter()
            .find(|(kind, _)| *kind == parent)
            .and_then(|(kind, id)| self.get(kind, id))
    }

    /// User that transitively owns `row`.
    fn owner_of(&self, row: &EntityRow) -> Option<i64> {
        let direct = |r: &EntityRow| {
            r.relations()
                .into_iter()
                .find(|(kind, _)| *kind == EntityKind::User)
                .map(|(_, id)| id)
        };
        match row.kind() {
            EntityKind::User => Some(row.id()),
            EntityKind::Document
            | EntityKind::Flashcard
            | EntityKind::Quiz
            | EntityKind::QuizAttempt => direct(row),
            EntityKind::QuizQuestion => self
                .parent_of(row, EntityKind::Quiz)
                .and_then(|quiz| direct(quiz)),
            EntityKind::QuizAnswer => self
                .parent_of(row, EntityKind::QuizQuestion)
                .and_then(|q| self.parent_of(q, EntityKind::Quiz))
                .and_then(|quiz| direct(quiz)),
            EntityKind::QuizAttemptAnswer => self
                .parent_of(row, EntityKind::QuizAttempt)
                .and_then(|attempt| direct(attempt)),
            EntityKind::FlashcardStudySession => self
                .parent_of(row, EntityKind::Flashcard)
                .and_then(|card| direct(card)),
        }
    }

    fn in_scope(&self, row: &EntityRow, scope: Scope) -> bool {
        match scope {
            Scope::All => true,
            Scope::User(user_id) => self.owner_of(row) == Some(user_id),
        }
    }

    fn check_constraints(&self, row: &EntityRow) -> Result<()> {
        for (parent, id) in row.relations() {
            if !self.exists(parent, id) {
                return Err(Error::InvalidInput(format!(
                    "foreign key violation: {} {} references missing {} {}",
                    row.kind().label(),
                    row.id(),
                    parent.label(),
                    id
                )));
            }
        }
        if let EntityRow::User(user) = row {
            let taken = self.table(EntityKind::User).is_some_and(|users| {
                users.values().any(|other| {
                    other.id() != user.id
                        && other.as_user().is_some_and(|u| u.email == user.email)
                })
            });
            if taken {
                return Err(Error::InvalidInput(format!(
                    "duplicate key: email {} already exists",
                    user.email
                )));
            }
        }
        Ok(())
    }

    fn put(&mut self, row: EntityRow) {
        self.rows.entry(row.kind()).or_default().insert(row.id(), row);
    }

    fn max_id(&self, kind: EntityKind) -> i64 {
        self.table(kind)
            .and_then(|t| t.keys().next_back().copied())
            .unwrap_or(0)
    }

    /// Draw from the sequence of `kind`. Like `nextval`, this does not look
    /// at the ids already in the table.
    fn next_id(&mut self, kind: EntityKind) -> i64 {
        let next = self.sequences.get(&kind).copied().unwrap_or(1);
        self.sequences.insert(kind, next + 1);
        next
    }

    fn align_sequence(&mut self, kind: EntityKind) {
        let next = self.max_id(kind) + 1;
        self.sequences.insert(kind, next);
    }

    /// Remove `ids` of `kind` and null out every relation pointing at them.
    fn remove(&mut self, kind: EntityKind, ids: &HashSet<i64>) {
        if let Some(table) = self.rows.get_mut(&kind) {
            table.retain(|id, _| !ids.contains(id));
        }
        for table in self.rows.values_mut() {
            for row in table.values_mut() {
                row.for_each_relation_mut(|parent, fk| {
                    if parent == kind && fk.is_some_and(|id| ids.contains(&id)) {
                        *fk = None;
                    }
                });
            }
        }
    }
}

/// In-memory [`BackupStore`].
///
/// Transactions are serialized: a transaction holds the store lock from begin
/// until commit, rollback or drop.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Tables>>,
    reject_explicit_ids: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `insert_with_id` always fails, forcing identity fallback.
    pub fn rejecting_explicit_ids() -> Self {
        Self {
            state: Arc::default(),
            reject_explicit_ids: true,
        }
    }

    /// Insert rows keeping their identities, then align the sequences.
    ///
    /// Rows must be given parents first.
    pub async fn seed(&self, rows: impl IntoIterator<Item = EntityRow>) -> Result<()> {
        let mut tables = self.state.lock().await;
        let mut work = tables.clone();
        for row in rows {
            if work.exists(row.kind(), row.id()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate key: {} {}",
                    row.kind().label(),
                    row.id()
                )));
            }
            work.check_constraints(&row)?;
            work.put(row);
        }
        for kind in EntityKind::TOPOLOGICAL {
            work.align_sequence(kind);
        }
        *tables = work;
        Ok(())
    }

    /// Committed rows of `kind`, ordered by identity.
    pub async fn rows(&self, kind: EntityKind) -> Vec<EntityRow> {
        let tables = self.state.lock().await;
        tables
            .table(kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Committed row count of `kind`.
    pub async fn count(&self, kind: EntityKind) -> usize {
        let tables = self.state.lock().await;
        tables.table(kind).map_or(0, |t| t.len())
    }

    pub async fn user(&self, id: i64) -> Option<User> {
        let tables = self.state.lock().await;
        tables
            .get(EntityKind::User, id)
            .and_then(|r| r.as_user())
            .cloned()
    }

    async fn begin(&self, read_only: bool) -> Box<dyn StoreTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Box::new(MemoryTransaction {
            guard,
            work,
            read_only,
            reject_explicit_ids: self.reject_explicit_ids,
        })
    }
}

#[async_trait]
impl BackupStore for MemoryStore {
    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(self.begin(true).await)
    }

    async fn begin_write(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(self.begin(false).await)
    }
}

/// Transaction over a private working copy of the store.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    read_only: bool,
    reject_explicit_ids: bool,
}

impl MemoryTransaction {
    /// Insert under the next sequence value, failing on an id already taken
    /// as a primary key would.
    fn insert_from_sequence(&mut self, row: &EntityRow) -> Result<i64> {
        let id = self.work.next_id(row.kind());
        if self.work.exists(row.kind(), id) {
            return Err(Error::InvalidInput(format!(
                "duplicate key: {} {} already exists",
                row.kind().label(),
                id
            )));
        }
        let mut stored = row.clone();
        stored.set_id(id);
        self.work.check_constraints(&stored)?;
        self.work.put(stored);
        Ok(id)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::InvalidInput(
                "cannot write in a read-only transaction".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn fetch_rows(&mut self, kind: EntityKind, scope: Scope) -> Result<Vec<EntityRow>> {
        let Some(table) = self.work.table(kind) else {
            return Ok(Vec::new());
        };
        Ok(table
            .values()
            .filter(|row| self.work.in_scope(row, scope))
            .cloned()
            .collect())
    }

    async fn find_user(&mut self, id: i64) -> Result<Option<User>> {
        Ok(self
            .work
            .get(EntityKind::User, id)
            .and_then(|r| r.as_user())
            .cloned())
    }

    async fn delete_rows(&mut self, kind: EntityKind, scope: Scope) -> Result<u64> {
        self.ensure_writable()?;
        let ids: HashSet<i64> = match self.work.table(kind) {
            Some(table) => table
                .values()
                .filter(|row| self.work.in_scope(row, scope))
                .map(|row| row.id())
                .collect(),
            None => HashSet::new(),
        };
        self.work.remove(kind, &ids);
        Ok(ids.len() as u64)
    }

    async fn insert_with_id(&mut self, row: &EntityRow) -> Result<()> {
        self.ensure_writable()?;
        if self.reject_explicit_ids {
            return Err(Error::InvalidInput(
                "explicit identities are not accepted by this store".to_string(),
            ));
        }
        if self.work.exists(row.kind(), row.id()) {
            return Err(Error::InvalidInput(format!(
                "duplicate key: {} {} already exists",
                row.kind().label(),
                row.id()
            )));
        }
        self.work.check_constraints(row)?;
        self.work.put(row.clone());
        Ok(())
    }

    async fn insert(&mut self, row: &EntityRow) -> Result<i64> {
        self.ensure_writable()?;
        self.work.align_sequence(row.kind());
        self.insert_from_sequence(row)
    }

    async fn update_row(&mut self, row: &EntityRow) -> Result<()> {
        self.ensure_writable()?;
        if !self.work.exists(row.kind(), row.id()) {
            return Err(Error::NotFound(format!(
                "{} {}",
                row.kind().label(),
                row.id()
            )));
        }
        self.work.check_constraints(row)?;
        self.work.put(row.clone());
        Ok(())
    }

    async fn upsert_user(&mut self, user: &User) -> Result<()> {
        self.ensure_writable()?;
        let row = EntityRow::User(user.clone());
        self.work.check_constraints(&row)?;
        self.work.put(row);
        Ok(())
    }

    async fn sync_identity(&mut self, kind: EntityKind) -> Result<()> {
        self.ensure_writable()?;
        self.work.align_sequence(kind);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            mut guard, work, ..
        } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
