//! Snapshot import with foreign-key remapping.
//!
//! A restore walks the nine kinds parents first. Every inserted row records
//! `original id -> new id` in an [`IdMapping`], and every foreign key of a
//! later row is rewritten through that mapping before it is inserted. A key
//! whose parent never made it into the mapping is cleared rather than left
//! dangling.
//!
//! A user merge clears only the target user's rows, which nulls references
//! held by other users' rows (an attempt on the target user's quiz, say).
//! Those rows are recorded before the clear and re-pointed through the
//! mapping once every kind is restored.
//!
//! Row-level failures are collected in [`RecoveryResult::errors`] and the walk
//! carries on. Only structural problems and store failures abort the run, in
//! which case the whole transaction is rolled back.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use studyvault_core::{
    check_snapshot_compatibility, BackupStore, CompatibilityResult, EntityKind, EntityRow, Error,
    FieldMap, Result, Scope, Snapshot, StoreTransaction, User,
};

/// How a snapshot is applied to the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RestoreMode {
    /// Wipe every table, then restore everything in the snapshot.
    FullReplace,
    /// Replace one user's data, keeping that user's identity and every other
    /// user's rows. Needs a single-user snapshot.
    UserMerge { target_user_id: i64 },
}

impl std::fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullReplace => write!(f, "full_replace"),
            Self::UserMerge { target_user_id } => write!(f, "user_merge:{}", target_user_id),
        }
    }
}

/// Where a restore run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Validating,
    ClearingTarget,
    Restoring(EntityKind),
    Relinking,
    Done,
}

impl std::fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validating => write!(f, "validating"),
            Self::ClearingTarget => write!(f, "clearing_target"),
            Self::Restoring(kind) => write!(f, "restoring:{}", kind),
            Self::Relinking => write!(f, "relinking"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Original-to-new identity table, one map per kind. Lives for one restore.
#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    maps: HashMap<EntityKind, HashMap<i64, i64>>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: EntityKind, original_id: i64, new_id: i64) {
        self.maps.entry(kind).or_default().insert(original_id, new_id);
    }

    pub fn resolve(&self, kind: EntityKind, original_id: i64) -> Option<i64> {
        self.maps.get(&kind)?.get(&original_id).copied()
    }

    /// Number of mapped rows of `kind`.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.maps.get(&kind).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.maps.values().all(HashMap::is_empty)
    }
}

/// Outcome of a restore run.
///
/// An empty `errors` list means every row in the snapshot was restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    pub backup_timestamp: NaiveDateTime,
    pub backup_version: String,
    pub recovery_timestamp: NaiveDateTime,
    pub users_restored: usize,
    pub documents_restored: usize,
    pub flashcards_restored: usize,
    pub quizzes_restored: usize,
    pub quiz_questions_restored: usize,
    pub quiz_answers_restored: usize,
    pub quiz_attempts_restored: usize,
    pub quiz_attempt_answers_restored: usize,
    pub flashcard_study_sessions_restored: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RecoveryResult {
    fn new(snapshot: &Snapshot) -> Self {
        Self {
            backup_timestamp: snapshot.backup_timestamp(),
            backup_version: snapshot.version().to_string(),
            recovery_timestamp: Local::now().naive_local(),
            users_restored: 0,
            documents_restored: 0,
            flashcards_restored: 0,
            quizzes_restored: 0,
            quiz_questions_restored: 0,
            quiz_answers_restored: 0,
            quiz_attempts_restored: 0,
            quiz_attempt_answers_restored: 0,
            flashcard_study_sessions_restored: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn counter_mut(&mut self, kind: EntityKind) -> &mut usize {
        match kind {
            EntityKind::User => &mut self.users_restored,
            EntityKind::Document => &mut self.documents_restored,
            EntityKind::Flashcard => &mut self.flashcards_restored,
            EntityKind::Quiz => &mut self.quizzes_restored,
            EntityKind::QuizQuestion => &mut self.quiz_questions_restored,
            EntityKind::QuizAnswer => &mut self.quiz_answers_restored,
            EntityKind::QuizAttempt => &mut self.quiz_attempts_restored,
            EntityKind::QuizAttemptAnswer => &mut self.quiz_attempt_answers_restored,
            EntityKind::FlashcardStudySession => &mut self.flashcard_study_sessions_restored,
        }
    }

    /// Rows of `kind` restored by this run.
    pub fn restored(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => self.users_restored,
            EntityKind::Document => self.documents_restored,
            EntityKind::Flashcard => self.flashcards_restored,
            EntityKind::Quiz => self.quizzes_restored,
            EntityKind::QuizQuestion => self.quiz_questions_restored,
            EntityKind::QuizAnswer => self.quiz_answers_restored,
            EntityKind::QuizAttempt => self.quiz_attempts_restored,
            EntityKind::QuizAttemptAnswer => self.quiz_attempt_answers_restored,
            EntityKind::FlashcardStudySession => self.flashcard_study_sessions_restored,
        }
    }

    pub fn total_restored(&self) -> usize {
        EntityKind::TOPOLOGICAL
            .into_iter()
            .map(|k| self.restored(k))
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Apply `snapshot` to `store` in one write transaction.
///
/// Returns `Err` only for structural problems (incompatible version, a full
/// snapshot given to [`RestoreMode::UserMerge`]) and store failures; in both
/// cases nothing is changed. Row failures end up in the result instead.
pub async fn restore(
    store: &dyn BackupStore,
    snapshot: &Snapshot,
    mode: RestoreMode,
) -> Result<RecoveryResult> {
    let start = Instant::now();
    let mut result = RecoveryResult::new(snapshot);

    log_phase(RestorePhase::Validating, mode);
    check_structure(snapshot, mode, &mut result)?;

    let mut tx = store.begin_write().await?;
    let outcome = {
        let mut run = RestoreRun {
            tx: tx.as_mut(),
            mode,
            mapping: IdMapping::new(),
            cleared: HashMap::new(),
            dependents: Vec::new(),
            result,
        };
        run.execute(snapshot).await.map(|()| run.result)
    };

    match outcome {
        Ok(result) => {
            tx.commit().await?;
            log_phase(RestorePhase::Done, mode);
            info!(
                subsystem = "backup",
                component = "importer",
                op = "restore",
                mode = %mode,
                row_count = result.total_restored(),
                error_count = result.errors.len(),
                warning_count = result.warnings.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Snapshot restored"
            );
            Ok(result)
        }
        Err(e) => {
            warn!(
                subsystem = "backup",
                component = "importer",
                op = "restore",
                mode = %mode,
                error = %e,
                "Restore failed, rolling back"
            );
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed restore also failed");
            }
            Err(e)
        }
    }
}

fn log_phase(phase: RestorePhase, mode: RestoreMode) {
    debug!(subsystem = "backup", component = "importer", phase = %phase, mode = %mode, "Restore phase");
}

/// Reject snapshots that cannot be applied at all.
fn check_structure(snapshot: &Snapshot, mode: RestoreMode, result: &mut RecoveryResult) -> Result<()> {
    match check_snapshot_compatibility(snapshot.version()) {
        CompatibilityResult::Compatible => {}
        CompatibilityResult::NewerMinor { warnings } => result.warnings.extend(warnings),
        CompatibilityResult::Incompatible { reason } => {
            return Err(Error::InvalidSnapshot(vec![reason]));
        }
    }

    if matches!(mode, RestoreMode::UserMerge { .. }) && !snapshot.is_user_snapshot() {
        return Err(Error::InvalidInput(
            "user merge needs a single-user snapshot, got a full snapshot".to_string(),
        ));
    }
    Ok(())
}

struct RestoreRun<'a> {
    tx: &'a mut dyn StoreTransaction,
    mode: RestoreMode,
    mapping: IdMapping,
    /// Ids removed by a user-scoped clear, per kind.
    cleared: HashMap<EntityKind, HashSet<i64>>,
    /// Out-of-scope rows, as they were before the clear, that reference
    /// cleared rows.
    dependents: Vec<EntityRow>,
    result: RecoveryResult,
}

impl RestoreRun<'_> {
    async fn execute(&mut self, snapshot: &Snapshot) -> Result<()> {
        if let RestoreMode::UserMerge { target_user_id } = self.mode {
            self.collect_dependents(target_user_id).await?;
        }
        log_phase(RestorePhase::ClearingTarget, self.mode);
        self.clear_target().await?;

        for kind in EntityKind::TOPOLOGICAL {
            log_phase(RestorePhase::Restoring(kind), self.mode);
            match (kind, self.mode) {
                (EntityKind::User, RestoreMode::UserMerge { target_user_id }) => {
                    self.merge_user(snapshot, target_user_id).await;
                }
                _ => {
                    for (index, fields) in snapshot.rows(kind).iter().enumerate() {
                        self.restore_row(kind, index, fields).await;
                    }
                }
            }
            self.tx.sync_identity(kind).await?;
            debug!(
                subsystem = "backup",
                component = "importer",
                entity_kind = %kind,
                row_count = self.result.restored(kind),
                "Kind restored"
            );
        }

        if !self.dependents.is_empty() {
            log_phase(RestorePhase::Relinking, self.mode);
            self.relink_dependents().await;
        }
        Ok(())
    }

    async fn collect_dependents(&mut self, user_id: i64) -> Result<()> {
        let mut cleared: HashMap<EntityKind, HashSet<i64>> = HashMap::new();
        for kind in EntityKind::owned() {
            let ids = self
                .tx
                .fetch_rows(kind, Scope::User(user_id))
                .await?
                .iter()
                .map(EntityRow::id)
                .collect();
            cleared.insert(kind, ids);
        }

        for kind in EntityKind::owned() {
            for row in self.tx.fetch_rows(kind, Scope::All).await? {
                if cleared.get(&kind).is_some_and(|ids| ids.contains(&row.id())) {
                    continue;
                }
                let references_cleared = row.relations().into_iter().any(|(parent, id)| {
                    cleared.get(&parent).is_some_and(|ids| ids.contains(&id))
                });
                if references_cleared {
                    self.dependents.push(row);
                }
            }
        }

        debug!(
            subsystem = "backup",
            component = "importer",
            user_id,
            row_count = self.dependents.len(),
            "Other users' rows reference the merged user's rows"
        );
        self.cleared = cleared;
        Ok(())
    }

    /// Point every recorded dependent back at the restored rows. A reference
    /// whose target is not in the snapshot stays cleared and is reported.
    async fn relink_dependents(&mut self) {
        for mut row in std::mem::take(&mut self.dependents) {
            let kind = row.kind();
            let id = row.id();
            let cleared = &self.cleared;
            let mapping = &self.mapping;
            let mut lost = Vec::new();
            row.for_each_relation_mut(|parent, fk| {
                if let Some(old) = *fk {
                    if cleared.get(&parent).is_some_and(|ids| ids.contains(&old)) {
                        *fk = mapping.resolve(parent, old);
                        if fk.is_none() {
                            lost.push((parent, old));
                        }
                    }
                }
            });

            for (parent, old) in lost {
                warn!(
                    subsystem = "backup",
                    component = "importer",
                    entity_kind = %kind,
                    original_id = id,
                    parent = %parent,
                    parent_id = old,
                    "Referenced row not in snapshot, reference cleared"
                );
                self.result.warnings.push(format!(
                    "{} {} lost its reference to {} {}, which is not in the snapshot",
                    kind.label(),
                    id,
                    parent.label(),
                    old
                ));
            }

            match self.tx.update_row(&row).await {
                Ok(()) => trace!(entity_kind = %kind, original_id = id, "Row relinked"),
                Err(e) => self.row_error(format!(
                    "Failed to relink {} {}: {}",
                    kind.label(),
                    id,
                    e
                )),
            }
        }
    }

    async fn clear_target(&mut self) -> Result<()> {
        let scope = match self.mode {
            RestoreMode::FullReplace => Scope::All,
            RestoreMode::UserMerge { target_user_id } => Scope::User(target_user_id),
        };
        for kind in EntityKind::reverse_topological() {
            if kind == EntityKind::User && scope != Scope::All {
                continue;
            }
            let deleted = self.tx.delete_rows(kind, scope).await?;
            debug!(
                subsystem = "backup",
                component = "importer",
                entity_kind = %kind,
                scope = %scope,
                row_count = deleted,
                "Cleared rows"
            );
        }
        Ok(())
    }

    /// Overwrite the target user with the snapshot's user record, keeping the
    /// target identity, and route every reference to the snapshot user there.
    async fn merge_user(&mut self, snapshot: &Snapshot, target_user_id: i64) {
        let snapshot_user_id = snapshot.user_id();
        let parsed = snapshot
            .rows(EntityKind::User)
            .first()
            .map(|fields| EntityRow::from_field_map(EntityKind::User, fields));

        let mut target_exists = match self.tx.find_user(target_user_id).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                self.row_error(format!("Failed to look up user {}: {}", target_user_id, e));
                false
            }
        };

        match parsed {
            Some(Ok(EntityRow::User(user))) => {
                let original_id = user.id;
                let merged = User {
                    id: target_user_id,
                    ..user
                };
                match self.tx.upsert_user(&merged).await {
                    Ok(()) => {
                        target_exists = true;
                        self.result.users_restored += 1;
                        self.mapping.record(EntityKind::User, original_id, target_user_id);
                        info!(
                            subsystem = "backup",
                            component = "importer",
                            original_id,
                            user_id = target_user_id,
                            "Merged snapshot user into target user"
                        );
                    }
                    Err(e) => self.row_error(format!(
                        "Failed to restore user: {}: {}",
                        merged.email, e
                    )),
                }
            }
            Some(Ok(_)) => self.row_error("user: record is not a user".to_string()),
            Some(Err(e)) => self.row_error(format!("Failed to restore user: {}", e)),
            None => self.row_error("user: missing user record".to_string()),
        }

        if !target_exists {
            self.row_error(format!(
                "Target user {} does not exist; owned rows are restored without an owner",
                target_user_id
            ));
            return;
        }
        if let Some(id) = snapshot_user_id {
            self.mapping.record(EntityKind::User, id, target_user_id);
        }
    }

    async fn restore_row(&mut self, kind: EntityKind, index: usize, fields: &FieldMap) {
        let mut row = match EntityRow::from_field_map(kind, fields) {
            Ok(row) => row,
            Err(e) => {
                self.row_error(format!(
                    "Failed to restore {} at {}[{}]: {}",
                    kind.label(),
                    kind.snapshot_key(),
                    index,
                    e
                ));
                return;
            }
        };
        let original_id = row.id();

        let mapping = &self.mapping;
        let mut orphaned = Vec::new();
        row.for_each_relation_mut(|parent, fk| {
            if let Some(old) = *fk {
                *fk = mapping.resolve(parent, old);
                if fk.is_none() {
                    orphaned.push((parent, old));
                }
            }
        });
        for (parent, old) in orphaned {
            debug!(
                subsystem = "backup",
                component = "importer",
                entity_kind = %kind,
                original_id,
                parent = %parent,
                parent_id = old,
                "Parent not restored, clearing reference"
            );
        }

        let new_id = match self.tx.insert_with_id(&row).await {
            Ok(()) => original_id,
            Err(explicit) => match self.tx.insert(&row).await {
                Ok(id) => {
                    warn!(
                        subsystem = "backup",
                        component = "importer",
                        entity_kind = %kind,
                        original_id,
                        new_id = id,
                        error = %explicit,
                        "Explicit identity rejected, used store-assigned id"
                    );
                    self.result.warnings.push(format!(
                        "{} {} restored with new id {} ({})",
                        kind.label(),
                        original_id,
                        id,
                        explicit
                    ));
                    id
                }
                Err(e) => {
                    self.row_error(format!(
                        "Failed to restore {}: {}: {}",
                        kind.label(),
                        row.describe(),
                        e
                    ));
                    return;
                }
            },
        };

        trace!(entity_kind = %kind, original_id, new_id, "Row restored");
        self.mapping.record(kind, original_id, new_id);
        *self.result.counter_mut(kind) += 1;
    }

    fn row_error(&mut self, message: String) {
        warn!(subsystem = "backup", component = "importer", error = %message, "Row skipped");
        self.result.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use studyvault_db::test_fixtures::scenario_graph;
    use studyvault_db::MemoryStore;

    fn snapshot(value: serde_json::Value) -> Snapshot {
        Snapshot::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_id_mapping() {
        let mut mapping = IdMapping::new();
        assert!(mapping.is_empty());
        mapping.record(EntityKind::Quiz, 7, 70);
        assert_eq!(mapping.resolve(EntityKind::Quiz, 7), Some(70));
        assert_eq!(mapping.resolve(EntityKind::Quiz, 8), None);
        assert_eq!(mapping.resolve(EntityKind::Document, 7), None);
        assert_eq!(mapping.len(EntityKind::Quiz), 1);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            RestorePhase::Restoring(EntityKind::QuizAnswer).to_string(),
            "restoring:quizAnswers"
        );
        assert_eq!(RestorePhase::ClearingTarget.to_string(), "clearing_target");
        assert_eq!(RestorePhase::Relinking.to_string(), "relinking");
    }

    #[tokio::test]
    async fn test_orphan_reference_is_cleared() {
        let store = MemoryStore::new();
        let snap = snapshot(json!({
            "backupTimestamp": "2026-03-01T10:00:00",
            "version": "1.0",
            "users": [{"id": 1, "email": "a@example.com", "password": "h"}],
            "flashcards": [{"id": 5, "question": "q", "answer": "a", "userId": 1, "documentId": 42}]
        }));

        let result = restore(&store, &snap, RestoreMode::FullReplace).await.unwrap();
        assert!(result.is_clean(), "{:?}", result.errors);
        assert_eq!(result.flashcards_restored, 1);

        let rows = store.rows(EntityKind::Flashcard).await;
        match &rows[0] {
            EntityRow::Flashcard(card) => {
                assert_eq!(card.document_id, None);
                assert_eq!(card.user_id, Some(1));
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_row_is_skipped() {
        let store = MemoryStore::new();
        let snap = snapshot(json!({
            "backupTimestamp": "2026-03-01T10:00:00",
            "version": "1.0",
            "users": [{"id": 1, "email": "a@example.com", "password": "h"}],
            "documents": [
                {"id": 1, "title": "ok", "userId": 1},
                {"id": 2, "userId": 1},
                {"id": 3, "title": "also ok", "userId": 1}
            ]
        }));

        let result = restore(&store, &snap, RestoreMode::FullReplace).await.unwrap();
        assert_eq!(result.documents_restored, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("documents[1]"), "{}", result.errors[0]);
        assert_eq!(store.count(EntityKind::Document).await, 2);
    }

    #[tokio::test]
    async fn test_incompatible_version_changes_nothing() {
        let store = MemoryStore::new();
        store.seed(scenario_graph()).await.unwrap();
        let snap = snapshot(json!({
            "backupTimestamp": "2026-03-01T10:00:00",
            "version": "2.0"
        }));

        let err = restore(&store, &snap, RestoreMode::FullReplace).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
        assert_eq!(store.count(EntityKind::Flashcard).await, 3);
    }

    #[tokio::test]
    async fn test_newer_minor_is_a_warning() {
        let store = MemoryStore::new();
        let snap = snapshot(json!({
            "backupTimestamp": "2026-03-01T10:00:00",
            "version": "1.4"
        }));

        let result = restore(&store, &snap, RestoreMode::FullReplace).await.unwrap();
        assert!(result.is_clean());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.backup_version, "1.4");
    }

    #[tokio::test]
    async fn test_user_merge_rejects_full_snapshot() {
        let store = MemoryStore::new();
        store.seed(scenario_graph()).await.unwrap();
        let snap = snapshot(json!({
            "backupTimestamp": "2026-03-01T10:00:00",
            "version": "1.0",
            "users": []
        }));

        let err = restore(&store, &snap, RestoreMode::UserMerge { target_user_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.count(EntityKind::Document).await, 2);
    }

    #[tokio::test]
    async fn test_user_merge_into_missing_target_inserts_it() {
        let store = MemoryStore::new();
        let snap = snapshot(json!({
            "backupTimestamp": "2026-03-01T10:00:00",
            "version": "1.0",
            "userId": 3,
            "user": {"id": 3, "email": "c@example.com", "password": "h"},
            "documents": [{"id": 9, "title": "t", "userId": 3}]
        }));

        let result = restore(&store, &snap, RestoreMode::UserMerge { target_user_id: 8 })
            .await
            .unwrap();
        assert!(result.is_clean(), "{:?}", result.errors);
        assert_eq!(store.user(8).await.unwrap().email, "c@example.com");
        match &store.rows(EntityKind::Document).await[0] {
            EntityRow::Document(doc) => assert_eq!(doc.user_id, Some(8)),
            other => panic!("unexpected row {:?}", other),
        }
    }
}
