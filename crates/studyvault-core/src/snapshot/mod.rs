//! Snapshot document format.
//!
//! A snapshot is one JSON document holding metadata plus one array of
//! field-maps per entity kind. Two variants share the per-kind schema:
//!
//! - [`DatabaseSnapshot`]: every row, users in a `users` array.
//! - [`UserSnapshot`]: one user's closure, the user in a single `user` field-map
//!   and the owner's id in `userId`.

pub mod compatibility;
pub mod naming;
pub mod validation;
pub mod version;

pub use compatibility::{check_snapshot_compatibility, CompatibilityResult};
pub use naming::{SnapshotKind, SnapshotName};
pub use validation::{validate_bytes, validate_snapshot, ValidationReport};
pub use version::{Version, CURRENT_SNAPSHOT_VERSION};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::kinds::EntityKind;
use crate::{Error, Result};

/// Flat map of snapshot field name to JSON value for one row.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// The per-kind arrays shared by both snapshot variants.
///
/// A missing array reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTables {
    #[serde(default)]
    pub documents: Vec<FieldMap>,
    #[serde(default)]
    pub flashcards: Vec<FieldMap>,
    #[serde(default)]
    pub quizzes: Vec<FieldMap>,
    #[serde(default)]
    pub quiz_questions: Vec<FieldMap>,
    #[serde(default)]
    pub quiz_answers: Vec<FieldMap>,
    #[serde(default)]
    pub quiz_attempts: Vec<FieldMap>,
    #[serde(default)]
    pub quiz_attempt_answers: Vec<FieldMap>,
    #[serde(default)]
    pub flashcard_study_sessions: Vec<FieldMap>,
}

impl SnapshotTables {
    /// Rows of an owned kind. Users are not held here and yield an empty slice.
    pub fn rows(&self, kind: EntityKind) -> &[FieldMap] {
        match kind {
            EntityKind::User => &[],
            EntityKind::Document => &self.documents,
            EntityKind::Flashcard => &self.flashcards,
            EntityKind::Quiz => &self.quizzes,
            EntityKind::QuizQuestion => &self.quiz_questions,
            EntityKind::QuizAnswer => &self.quiz_answers,
            EntityKind::QuizAttempt => &self.quiz_attempts,
            EntityKind::QuizAttemptAnswer => &self.quiz_attempt_answers,
            EntityKind::FlashcardStudySession => &self.flashcard_study_sessions,
        }
    }

    /// Mutable rows of an owned kind, `None` for users.
    pub fn rows_mut(&mut self, kind: EntityKind) -> Option<&mut Vec<FieldMap>> {
        match kind {
            EntityKind::User => None,
            EntityKind::Document => Some(&mut self.documents),
            EntityKind::Flashcard => Some(&mut self.flashcards),
            EntityKind::Quiz => Some(&mut self.quizzes),
            EntityKind::QuizQuestion => Some(&mut self.quiz_questions),
            EntityKind::QuizAnswer => Some(&mut self.quiz_answers),
            EntityKind::QuizAttempt => Some(&mut self.quiz_attempts),
            EntityKind::QuizAttemptAnswer => Some(&mut self.quiz_attempt_answers),
            EntityKind::FlashcardStudySession => Some(&mut self.flashcard_study_sessions),
        }
    }
}

/// Snapshot of the whole database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    pub backup_timestamp: NaiveDateTime,
    pub version: String,
    #[serde(default)]
    pub users: Vec<FieldMap>,
    #[serde(flatten)]
    pub tables: SnapshotTables,
}

/// Snapshot of one user and every row that user transitively owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub backup_timestamp: NaiveDateTime,
    pub version: String,
    pub user_id: i64,
    #[serde(default)]
    pub user: Option<FieldMap>,
    #[serde(flatten)]
    pub tables: SnapshotTables,
}

/// Either snapshot variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Database(DatabaseSnapshot),
    User(UserSnapshot),
}

impl Snapshot {
    /// Parse a snapshot document.
    ///
    /// The variant is chosen by shape: a document carrying `user` or `userId`
    /// is a single-user snapshot, anything else is a full one.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Serialization("snapshot root is not a JSON object".into()))?;

        if obj.contains_key("user") || obj.contains_key("userId") {
            Ok(Self::User(serde_json::from_value(value)?))
        } else {
            Ok(Self::Database(serde_json::from_value(value)?))
        }
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_vec_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn backup_timestamp(&self) -> NaiveDateTime {
        match self {
            Self::Database(s) => s.backup_timestamp,
            Self::User(s) => s.backup_timestamp,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Database(s) => &s.version,
            Self::User(s) => &s.version,
        }
    }

    pub fn tables(&self) -> &SnapshotTables {
        match self {
            Self::Database(s) => &s.tables,
            Self::User(s) => &s.tables,
        }
    }

    /// Owning user of a single-user snapshot.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Database(_) => None,
            Self::User(s) => Some(s.user_id),
        }
    }

    pub fn is_user_snapshot(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Rows of any kind, in document order.
    pub fn rows(&self, kind: EntityKind) -> &[FieldMap] {
        match (self, kind) {
            (Self::Database(s), EntityKind::User) => &s.users,
            (Self::User(s), EntityKind::User) => match &s.user {
                Some(user) => std::slice::from_ref(user),
                None => &[],
            },
            (_, kind) => self.tables().rows(kind),
        }
    }

    /// Row count per kind in topological order.
    pub fn counts(&self) -> Vec<(EntityKind, usize)> {
        EntityKind::TOPOLOGICAL
            .into_iter()
            .map(|k| (k, self.rows(k).len()))
            .collect()
    }
}
