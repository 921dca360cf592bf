//! Entity kinds and their dependency order.
//!
//! The nine kinds form a DAG. [`EntityKind::TOPOLOGICAL`] lists them parents
//! first; every restore walks that order and every clear walks it backwards.

use serde::{Deserialize, Serialize};

/// One of the nine persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    User,
    Document,
    Flashcard,
    Quiz,
    QuizQuestion,
    QuizAnswer,
    QuizAttempt,
    QuizAttemptAnswer,
    FlashcardStudySession,
}

/// A foreign key held by a kind: the snapshot field and the kind it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub field: &'static str,
    pub parent: EntityKind,
}

const DOCUMENT_RELATIONS: &[Relation] = &[Relation {
    field: "userId",
    parent: EntityKind::User,
}];

const OWNED_WITH_DOCUMENT: &[Relation] = &[
    Relation {
        field: "userId",
        parent: EntityKind::User,
    },
    Relation {
        field: "documentId",
        parent: EntityKind::Document,
    },
];

const QUESTION_RELATIONS: &[Relation] = &[Relation {
    field: "quizId",
    parent: EntityKind::Quiz,
}];

const ANSWER_RELATIONS: &[Relation] = &[Relation {
    field: "questionId",
    parent: EntityKind::QuizQuestion,
}];

const ATTEMPT_RELATIONS: &[Relation] = &[
    Relation {
        field: "userId",
        parent: EntityKind::User,
    },
    Relation {
        field: "quizId",
        parent: EntityKind::Quiz,
    },
];

const ATTEMPT_ANSWER_RELATIONS: &[Relation] = &[
    Relation {
        field: "attemptId",
        parent: EntityKind::QuizAttempt,
    },
    Relation {
        field: "questionId",
        parent: EntityKind::QuizQuestion,
    },
    Relation {
        field: "selectedAnswerId",
        parent: EntityKind::QuizAnswer,
    },
];

const STUDY_SESSION_RELATIONS: &[Relation] = &[Relation {
    field: "flashcardId",
    parent: EntityKind::Flashcard,
}];

impl EntityKind {
    /// All kinds, parents before children.
    pub const TOPOLOGICAL: [EntityKind; 9] = [
        EntityKind::User,
        EntityKind::Document,
        EntityKind::Flashcard,
        EntityKind::Quiz,
        EntityKind::QuizQuestion,
        EntityKind::QuizAnswer,
        EntityKind::QuizAttempt,
        EntityKind::QuizAttemptAnswer,
        EntityKind::FlashcardStudySession,
    ];

    /// All kinds, children before parents. Deletes run in this order.
    pub fn reverse_topological() -> impl Iterator<Item = EntityKind> {
        Self::TOPOLOGICAL.into_iter().rev()
    }

    /// Kinds whose rows live in the per-kind arrays of every snapshot variant.
    /// Users are excluded because the two variants store them differently.
    pub fn owned() -> impl Iterator<Item = EntityKind> {
        Self::TOPOLOGICAL.into_iter().skip(1)
    }

    /// Key of this kind's array in the snapshot document.
    pub fn snapshot_key(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Document => "documents",
            Self::Flashcard => "flashcards",
            Self::Quiz => "quizzes",
            Self::QuizQuestion => "quizQuestions",
            Self::QuizAnswer => "quizAnswers",
            Self::QuizAttempt => "quizAttempts",
            Self::QuizAttemptAnswer => "quizAttemptAnswers",
            Self::FlashcardStudySession => "flashcardStudySessions",
        }
    }

    /// Backing SQL table.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Document => "documents",
            Self::Flashcard => "flashcards",
            Self::Quiz => "quizzes",
            Self::QuizQuestion => "quiz_questions",
            Self::QuizAnswer => "quiz_answers",
            Self::QuizAttempt => "quiz_attempts",
            Self::QuizAttemptAnswer => "quiz_attempt_answers",
            Self::FlashcardStudySession => "flashcard_study_sessions",
        }
    }

    /// Human-readable singular name used in row-level error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Document => "document",
            Self::Flashcard => "flashcard",
            Self::Quiz => "quiz",
            Self::QuizQuestion => "quiz question",
            Self::QuizAnswer => "quiz answer",
            Self::QuizAttempt => "quiz attempt",
            Self::QuizAttemptAnswer => "quiz attempt answer",
            Self::FlashcardStudySession => "flashcard study session",
        }
    }

    /// Snapshot fields that must be present and non-null on every row.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::User => &["id", "email", "password"],
            Self::Document => &["id", "title", "userId"],
            Self::Flashcard => &["id", "question", "answer", "userId"],
            Self::Quiz => &["id", "title", "userId"],
            Self::QuizQuestion => &["id", "questionText", "quizId"],
            Self::QuizAnswer => &["id", "answerText", "questionId"],
            Self::QuizAttempt => &["id", "userId", "quizId"],
            Self::QuizAttemptAnswer => &["id", "attemptId", "questionId"],
            Self::FlashcardStudySession => &["id", "flashcardId"],
        }
    }

    /// Foreign keys carried by rows of this kind.
    pub fn relations(&self) -> &'static [Relation] {
        match self {
            Self::User => &[],
            Self::Document => DOCUMENT_RELATIONS,
            Self::Flashcard | Self::Quiz => OWNED_WITH_DOCUMENT,
            Self::QuizQuestion => QUESTION_RELATIONS,
            Self::QuizAnswer => ANSWER_RELATIONS,
            Self::QuizAttempt => ATTEMPT_RELATIONS,
            Self::QuizAttemptAnswer => ATTEMPT_ANSWER_RELATIONS,
            Self::FlashcardStudySession => STUDY_SESSION_RELATIONS,
        }
    }

    /// Position in [`EntityKind::TOPOLOGICAL`].
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.snapshot_key())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::TOPOLOGICAL
            .into_iter()
            .find(|k| k.snapshot_key() == s)
            .ok_or_else(|| format!("Invalid entity kind: {}", s))
    }
}

/// Which rows an export or a clear touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "scope", content = "user_id")]
pub enum Scope {
    /// Every row regardless of owner.
    All,
    /// Rows transitively owned by one user.
    User(i64),
}

impl Scope {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::User(id) => write!(f, "user:{}", id),
        }
    }
}
