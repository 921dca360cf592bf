//! Data models for the study application's persisted entities.
//!
//! Field names serialize in camelCase so a record converts directly to the
//! per-kind field-map stored in snapshots. Relations are bare identities.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::kinds::EntityKind;
use crate::snapshot::FieldMap;
use crate::{Error, Result};

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

// =============================================================================
// ENUMS
// =============================================================================

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Text-extraction state of an uploaded document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid processing status: {}", s)),
        }
    }
}

/// Difficulty shared by flashcards and quizzes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EASY" => Ok(Self::Easy),
            "MEDIUM" => Ok(Self::Medium),
            "HARD" => Ok(Self::Hard),
            _ => Err(format!("Invalid difficulty: {}", s)),
        }
    }
}

/// Kind of quiz question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "MULTIPLE_CHOICE",
            Self::TrueFalse => "TRUE_FALSE",
            Self::ShortAnswer => "SHORT_ANSWER",
            Self::Essay => "ESSAY",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MULTIPLE_CHOICE" => Ok(Self::MultipleChoice),
            "TRUE_FALSE" => Ok(Self::TrueFalse),
            "SHORT_ANSWER" => Ok(Self::ShortAnswer),
            "ESSAY" => Ok(Self::Essay),
            _ => Err(format!("Invalid question type: {}", s)),
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// Application account. `password` holds the stored hash and is copied verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

/// Uploaded study document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: i64,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub document_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_limit_minutes: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub difficulty: Difficulty,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_published: bool,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub document_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: i64,
    pub question_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub points: Option<i32>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub quiz_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub id: i64,
    pub answer_text: String,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub question_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub time_spent_minutes: Option<i32>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub quiz_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptAnswer {
    pub id: i64,
    #[serde(default)]
    pub selected_answer_id: Option<i64>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub attempt_id: Option<i64>,
    #[serde(default)]
    pub question_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardStudySession {
    pub id: i64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub time_spent_seconds: Option<i32>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub flashcard_id: Option<i64>,
}

// =============================================================================
// ENTITY ROW
// =============================================================================

/// A typed row of any of the nine kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRow {
    User(User),
    Document(Document),
    Flashcard(Flashcard),
    Quiz(Quiz),
    QuizQuestion(QuizQuestion),
    QuizAnswer(QuizAnswer),
    QuizAttempt(QuizAttempt),
    QuizAttemptAnswer(QuizAttemptAnswer),
    FlashcardStudySession(FlashcardStudySession),
}

impl EntityRow {
    /// Build a typed row of `kind` from a snapshot field-map.
    pub fn from_field_map(kind: EntityKind, map: &FieldMap) -> Result<Self> {
        let value = serde_json::Value::Object(map.clone());
        let row = match kind {
            EntityKind::User => Self::User(serde_json::from_value(value)?),
            EntityKind::Document => Self::Document(serde_json::from_value(value)?),
            EntityKind::Flashcard => Self::Flashcard(serde_json::from_value(value)?),
            EntityKind::Quiz => Self::Quiz(serde_json::from_value(value)?),
            EntityKind::QuizQuestion => Self::QuizQuestion(serde_json::from_value(value)?),
            EntityKind::QuizAnswer => Self::QuizAnswer(serde_json::from_value(value)?),
            EntityKind::QuizAttempt => Self::QuizAttempt(serde_json::from_value(value)?),
            EntityKind::QuizAttemptAnswer => {
                Self::QuizAttemptAnswer(serde_json::from_value(value)?)
            }
            EntityKind::FlashcardStudySession => {
                Self::FlashcardStudySession(serde_json::from_value(value)?)
            }
        };
        Ok(row)
    }

    /// Flatten this row into a snapshot field-map.
    pub fn to_field_map(&self) -> Result<FieldMap> {
        let value = match self {
            Self::User(r) => serde_json::to_value(r)?,
            Self::Document(r) => serde_json::to_value(r)?,
            Self::Flashcard(r) => serde_json::to_value(r)?,
            Self::Quiz(r) => serde_json::to_value(r)?,
            Self::QuizQuestion(r) => serde_json::to_value(r)?,
            Self::QuizAnswer(r) => serde_json::to_value(r)?,
            Self::QuizAttempt(r) => serde_json::to_value(r)?,
            Self::QuizAttemptAnswer(r) => serde_json::to_value(r)?,
            Self::FlashcardStudySession(r) => serde_json::to_value(r)?,
        };
        match value {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(Error::Serialization(format!(
                "{} row serialized to non-object: {}",
                self.kind(),
                other
            ))),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Document(_) => EntityKind::Document,
            Self::Flashcard(_) => EntityKind::Flashcard,
            Self::Quiz(_) => EntityKind::Quiz,
            Self::QuizQuestion(_) => EntityKind::QuizQuestion,
            Self::QuizAnswer(_) => EntityKind::QuizAnswer,
            Self::QuizAttempt(_) => EntityKind::QuizAttempt,
            Self::QuizAttemptAnswer(_) => EntityKind::QuizAttemptAnswer,
            Self::FlashcardStudySession(_) => EntityKind::FlashcardStudySession,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::User(r) => r.id,
            Self::Document(r) => r.id,
            Self::Flashcard(r) => r.id,
            Self::Quiz(r) => r.id,
            Self::QuizQuestion(r) => r.id,
            Self::QuizAnswer(r) => r.id,
            Self::QuizAttempt(r) => r.id,
            Self::QuizAttemptAnswer(r) => r.id,
            Self::FlashcardStudySession(r) => r.id,
        }
    }

    pub fn set_id(&mut self, id: i64) {
        match self {
            Self::User(r) => r.id = id,
            Self::Document(r) => r.id = id,
            Self::Flashcard(r) => r.id = id,
            Self::Quiz(r) => r.id = id,
            Self::QuizQuestion(r) => r.id = id,
            Self::QuizAnswer(r) => r.id = id,
            Self::QuizAttempt(r) => r.id = id,
            Self::QuizAttemptAnswer(r) => r.id = id,
            Self::FlashcardStudySession(r) => r.id = id,
        }
    }

    /// Visit every foreign key of this row together with the kind it points at.
    ///
    /// The visitor may rewrite or clear the key in place.
    pub fn for_each_relation_mut(&mut self, mut visit: impl FnMut(EntityKind, &mut Option<i64>)) {
        match self {
            Self::User(_) => {}
            Self::Document(r) => visit(EntityKind::User, &mut r.user_id),
            Self::Flashcard(r) => {
                visit(EntityKind::User, &mut r.user_id);
                visit(EntityKind::Document, &mut r.document_id);
            }
            Self::Quiz(r) => {
                visit(EntityKind::User, &mut r.user_id);
                visit(EntityKind::Document, &mut r.document_id);
            }
            Self::QuizQuestion(r) => visit(EntityKind::Quiz, &mut r.quiz_id),
            Self::QuizAnswer(r) => visit(EntityKind::QuizQuestion, &mut r.question_id),
            Self::QuizAttempt(r) => {
                visit(EntityKind::User, &mut r.user_id);
                visit(EntityKind::Quiz, &mut r.quiz_id);
            }
            Self::QuizAttemptAnswer(r) => {
                visit(EntityKind::QuizAttempt, &mut r.attempt_id);
                visit(EntityKind::QuizQuestion, &mut r.question_id);
                visit(EntityKind::QuizAnswer, &mut r.selected_answer_id);
            }
            Self::FlashcardStudySession(r) => {
                visit(EntityKind::Flashcard, &mut r.flashcard_id)
            }
        }
    }

    /// Foreign keys of this row as `(parent kind, id)` pairs, unset ones skipped.
    pub fn relations(&self) -> Vec<(EntityKind, i64)> {
        let mut out = Vec::new();
        let mut copy = self.clone();
        copy.for_each_relation_mut(|kind, fk| {
            if let Some(id) = *fk {
                out.push((kind, id));
            }
        });
        out
    }

    /// Short description used in row-level error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::User(r) => r.email.clone(),
            Self::Document(r) => r.title.clone(),
            Self::Flashcard(r) => r.question.clone(),
            Self::Quiz(r) => r.title.clone(),
            Self::QuizQuestion(r) => r.question_text.clone(),
            Self::QuizAnswer(r) => r.answer_text.clone(),
            other => format!("#{}", other.id()),
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            _ => None,
        }
    }
}

macro_rules! impl_from_record {
    ($($record:ident),* $(,)?) => {
        $(
            impl From<$record> for EntityRow {
                fn from(r: $record) -> Self {
                    Self::$record(r)
                }
            }
        )*
    };
}

impl_from_record!(
    User,
    Document,
    Flashcard,
    Quiz,
    QuizQuestion,
    QuizAnswer,
    QuizAttempt,
    QuizAttemptAnswer,
    FlashcardStudySession,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> FieldMap {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&QuestionType::MultipleChoice).unwrap(),
            "\"MULTIPLE_CHOICE\""
        );
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(
            "processing".parse::<ProcessingStatus>().unwrap(),
            ProcessingStatus::Processing
        );
        assert!("VERY_HARD".parse::<Difficulty>().is_err());
        assert_eq!(QuestionType::TrueFalse.to_string(), "TRUE_FALSE");
    }

    #[test]
    fn test_user_defaults_for_missing_and_null() {
        let row = EntityRow::from_field_map(
            EntityKind::User,
            &map(json!({
                "id": 1,
                "email": "a@example.com",
                "password": "$2a$10$hash",
                "role": null,
                "enabled": null
            })),
        )
        .unwrap();
        let user = row.as_user().unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.enabled);
        assert!(user.first_name.is_none());
    }

    #[test]
    fn test_missing_required_scalar_is_error() {
        let err = EntityRow::from_field_map(EntityKind::Document, &map(json!({"id": 3})))
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_field_map_uses_camel_case_and_iso_timestamps() {
        let row = EntityRow::from_field_map(
            EntityKind::Quiz,
            &map(json!({
                "id": 9,
                "title": "Rust",
                "timeLimitMinutes": 15,
                "isPublished": true,
                "createdAt": "2026-03-01T10:15:30",
                "userId": 1,
                "documentId": null
            })),
        )
        .unwrap();
        let out = row.to_field_map().unwrap();
        assert_eq!(out["timeLimitMinutes"], json!(15));
        assert_eq!(out["isPublished"], json!(true));
        assert_eq!(out["difficulty"], json!("MEDIUM"));
        assert_eq!(out["createdAt"], json!("2026-03-01T10:15:30"));
        assert_eq!(out["userId"], json!(1));
        assert_eq!(out["documentId"], serde_json::Value::Null);
    }

    #[test]
    fn test_relations_follow_kind_table() {
        for kind in EntityKind::TOPOLOGICAL {
            let mut fields = json!({
                "id": 1,
                "email": "e", "password": "p",
                "title": "t", "question": "q", "answer": "a",
                "questionText": "qt", "answerText": "at"
            });
            for relation in kind.relations() {
                fields[relation.field] = json!(5);
            }
            let row = EntityRow::from_field_map(kind, &map(fields)).unwrap();
            let parents: Vec<_> = row.relations().into_iter().map(|(k, _)| k).collect();
            let expected: Vec<_> = kind.relations().iter().map(|r| r.parent).collect();
            assert_eq!(parents, expected, "relations of {}", kind);
        }
    }

    #[test]
    fn test_for_each_relation_mut_rewrites() {
        let mut row = EntityRow::Flashcard(Flashcard {
            id: 1,
            question: "q".into(),
            answer: "a".into(),
            category: None,
            difficulty: Difficulty::Easy,
            created_at: None,
            updated_at: None,
            user_id: Some(10),
            document_id: Some(20),
        });
        row.for_each_relation_mut(|kind, fk| {
            if kind == EntityKind::Document {
                *fk = None;
            } else if let Some(id) = fk.as_mut() {
                *id += 100;
            }
        });
        assert_eq!(row.relations(), vec![(EntityKind::User, 110)]);
    }

    #[test]
    fn test_describe() {
        let row = EntityRow::FlashcardStudySession(FlashcardStudySession {
            id: 4,
            score: None,
            time_spent_seconds: None,
            created_at: None,
            updated_at: None,
            flashcard_id: None,
        });
        assert_eq!(row.describe(), "#4");
    }
}
