//! Column layout, SQL text and row codecs for the nine tables.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use studyvault_core::{
    Document, EntityKind, EntityRow, Error, Flashcard, FlashcardStudySession, Quiz, QuizAnswer,
    QuizAttempt, QuizAttemptAnswer, QuizQuestion, Result, Scope, User,
};

/// Non-identity columns of each table, in bind order.
pub(crate) fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::User => &[
            "first_name",
            "last_name",
            "email",
            "password",
            "role",
            "enabled",
            "created_at",
            "updated_at",
        ],
        EntityKind::Document => &[
            "title",
            "description",
            "file_type",
            "file_name",
            "file_path",
            "file_size",
            "content",
            "summary",
            "processing_status",
            "created_at",
            "updated_at",
            "user_id",
        ],
        EntityKind::Flashcard => &[
            "question",
            "answer",
            "category",
            "difficulty",
            "created_at",
            "updated_at",
            "user_id",
            "document_id",
        ],
        EntityKind::Quiz => &[
            "title",
            "description",
            "time_limit_minutes",
            "difficulty",
            "is_published",
            "created_at",
            "updated_at",
            "user_id",
            "document_id",
        ],
        EntityKind::QuizQuestion => &[
            "question_text",
            "question_type",
            "points",
            "order_index",
            "created_at",
            "updated_at",
            "quiz_id",
        ],
        EntityKind::QuizAnswer => &[
            "answer_text",
            "is_correct",
            "order_index",
            "created_at",
            "updated_at",
            "question_id",
        ],
        EntityKind::QuizAttempt => &[
            "score",
            "max_score",
            "time_spent_minutes",
            "completed_at",
            "created_at",
            "updated_at",
            "user_id",
            "quiz_id",
        ],
        EntityKind::QuizAttemptAnswer => &[
            "selected_answer_id",
            "is_correct",
            "created_at",
            "updated_at",
            "attempt_id",
            "question_id",
        ],
        EntityKind::FlashcardStudySession => &[
            "score",
            "time_spent_seconds",
            "created_at",
            "updated_at",
            "flashcard_id",
        ],
    }
}

/// Predicate on alias `t` selecting rows transitively owned by user `$1`.
pub(crate) fn owner_filter(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "t.id = $1",
        EntityKind::Document
        | EntityKind::Flashcard
        | EntityKind::Quiz
        | EntityKind::QuizAttempt => "t.user_id = $1",
        EntityKind::QuizQuestion => "t.quiz_id IN (SELECT z.id FROM quizzes z WHERE z.user_id = $1)",
        EntityKind::QuizAnswer => {
            "t.question_id IN (SELECT q.id FROM quiz_questions q \
             JOIN quizzes z ON z.id = q.quiz_id WHERE z.user_id = $1)"
        }
        EntityKind::QuizAttemptAnswer => {
            "t.attempt_id IN (SELECT a.id FROM quiz_attempts a WHERE a.user_id = $1)"
        }
        EntityKind::FlashcardStudySession => {
            "t.flashcard_id IN (SELECT f.id FROM flashcards f WHERE f.user_id = $1)"
        }
    }
}

pub(crate) fn select_sql(kind: EntityKind, scope: Scope) -> String {
    let cols: Vec<String> = std::iter::once("id")
        .chain(columns(kind).iter().copied())
        .map(|c| format!("t.{}", c))
        .collect();
    let filter = match scope {
        Scope::All => String::new(),
        Scope::User(_) => format!(" WHERE {}", owner_filter(kind)),
    };
    format!(
        "SELECT {} FROM {} t{} ORDER BY t.id",
        cols.join(", "),
        kind.table_name(),
        filter
    )
}

pub(crate) fn delete_sql(kind: EntityKind, scope: Scope) -> String {
    match scope {
        Scope::All => format!("DELETE FROM {}", kind.table_name()),
        Scope::User(_) => format!(
            "DELETE FROM {} t WHERE {}",
            kind.table_name(),
            owner_filter(kind)
        ),
    }
}

/// INSERT statement; with `with_id` the identity is bound as `$1`.
pub(crate) fn insert_sql(kind: EntityKind, with_id: bool) -> String {
    let cols = columns(kind);
    let total = cols.len() + usize::from(with_id);
    let placeholders: Vec<String> = (1..=total).map(|i| format!("${}", i)).collect();
    if with_id {
        format!(
            "INSERT INTO {} (id, {}) VALUES ({})",
            kind.table_name(),
            cols.join(", "),
            placeholders.join(", ")
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
            kind.table_name(),
            cols.join(", "),
            placeholders.join(", ")
        )
    }
}

/// Insert-or-overwrite of a user keyed by identity.
pub(crate) fn upsert_user_sql() -> String {
    let updates: Vec<String> = columns(EntityKind::User)
        .iter()
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    format!(
        "{} ON CONFLICT (id) DO UPDATE SET {}",
        insert_sql(EntityKind::User, true),
        updates.join(", ")
    )
}

/// UPDATE of every non-identity column; the identity is bound as `$1`.
pub(crate) fn update_sql(kind: EntityKind) -> String {
    let assignments: Vec<String> = columns(kind)
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", c, i + 2))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = $1",
        kind.table_name(),
        assignments.join(", ")
    )
}

pub(crate) fn sync_identity_sql(kind: EntityKind) -> String {
    let table = kind.table_name();
    format!(
        "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
         COALESCE((SELECT MAX(id) FROM {table}), 0) + 1, false)"
    )
}

/// Bind every non-identity column of `row` in [`columns`] order.
pub(crate) fn bind_columns<'q>(
    query: Query<'q, Postgres, PgArguments>,
    row: &'q EntityRow,
) -> Query<'q, Postgres, PgArguments> {
    match row {
        EntityRow::User(r) => query
            .bind(r.first_name.as_deref())
            .bind(r.last_name.as_deref())
            .bind(r.email.as_str())
            .bind(r.password.as_str())
            .bind(r.role.as_str())
            .bind(r.enabled)
            .bind(r.created_at)
            .bind(r.updated_at),
        EntityRow::Document(r) => query
            .bind(r.title.as_str())
            .bind(r.description.as_deref())
            .bind(r.file_type.as_deref())
            .bind(r.file_name.as_deref())
            .bind(r.file_path.as_deref())
            .bind(r.file_size)
            .bind(r.content.as_deref())
            .bind(r.summary.as_deref())
            .bind(r.processing_status.as_str())
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.user_id),
        EntityRow::Flashcard(r) => query
            .bind(r.question.as_str())
            .bind(r.answer.as_str())
            .bind(r.category.as_deref())
            .bind(r.difficulty.as_str())
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.user_id)
            .bind(r.document_id),
        EntityRow::Quiz(r) => query
            .bind(r.title.as_str())
            .bind(r.description.as_deref())
            .bind(r.time_limit_minutes)
            .bind(r.difficulty.as_str())
            .bind(r.is_published)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.user_id)
            .bind(r.document_id),
        EntityRow::QuizQuestion(r) => query
            .bind(r.question_text.as_str())
            .bind(r.question_type.as_str())
            .bind(r.points)
            .bind(r.order)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.quiz_id),
        EntityRow::QuizAnswer(r) => query
            .bind(r.answer_text.as_str())
            .bind(r.is_correct)
            .bind(r.order)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.question_id),
        EntityRow::QuizAttempt(r) => query
            .bind(r.score)
            .bind(r.max_score)
            .bind(r.time_spent_minutes)
            .bind(r.completed_at)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.user_id)
            .bind(r.quiz_id),
        EntityRow::QuizAttemptAnswer(r) => query
            .bind(r.selected_answer_id)
            .bind(r.is_correct)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.attempt_id)
            .bind(r.question_id),
        EntityRow::FlashcardStudySession(r) => query
            .bind(r.score)
            .bind(r.time_spent_seconds)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.flashcard_id),
    }
}

fn get<'r, T>(row: &'r PgRow, col: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(col).map_err(Error::Database)
}

fn get_enum<T>(row: &PgRow, kind: EntityKind, col: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = get(row, col)?;
    raw.parse()
        .map_err(|e| Error::Serialization(format!("{}.{}: {}", kind.table_name(), col, e)))
}

/// Decode a row selected with [`select_sql`] into a typed record.
pub(crate) fn decode_row(kind: EntityKind, row: &PgRow) -> Result<EntityRow> {
    let decoded = match kind {
        EntityKind::User => EntityRow::User(decode_user(row)?),
        EntityKind::Document => EntityRow::Document(Document {
            id: get(row, "id")?,
            title: get(row, "title")?,
            description: get(row, "description")?,
            file_type: get(row, "file_type")?,
            file_name: get(row, "file_name")?,
            file_path: get(row, "file_path")?,
            file_size: get(row, "file_size")?,
            content: get(row, "content")?,
            summary: get(row, "summary")?,
            processing_status: get_enum(row, kind, "processing_status")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            user_id: get(row, "user_id")?,
        }),
        EntityKind::Flashcard => EntityRow::Flashcard(Flashcard {
            id: get(row, "id")?,
            question: get(row, "question")?,
            answer: get(row, "answer")?,
            category: get(row, "category")?,
            difficulty: get_enum(row, kind, "difficulty")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            user_id: get(row, "user_id")?,
            document_id: get(row, "document_id")?,
        }),
        EntityKind::Quiz => EntityRow::Quiz(Quiz {
            id: get(row, "id")?,
            title: get(row, "title")?,
            description: get(row, "description")?,
            time_limit_minutes: get(row, "time_limit_minutes")?,
            difficulty: get_enum(row, kind, "difficulty")?,
            is_published: get(row, "is_published")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            user_id: get(row, "user_id")?,
            document_id: get(row, "document_id")?,
        }),
        EntityKind::QuizQuestion => EntityRow::QuizQuestion(QuizQuestion {
            id: get(row, "id")?,
            question_text: get(row, "question_text")?,
            question_type: get_enum(row, kind, "question_type")?,
            points: get(row, "points")?,
            order: get(row, "order_index")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            quiz_id: get(row, "quiz_id")?,
        }),
        EntityKind::QuizAnswer => EntityRow::QuizAnswer(QuizAnswer {
            id: get(row, "id")?,
            answer_text: get(row, "answer_text")?,
            is_correct: get(row, "is_correct")?,
            order: get(row, "order_index")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            question_id: get(row, "question_id")?,
        }),
        EntityKind::QuizAttempt => EntityRow::QuizAttempt(QuizAttempt {
            id: get(row, "id")?,
            score: get(row, "score")?,
            max_score: get(row, "max_score")?,
            time_spent_minutes: get(row, "time_spent_minutes")?,
            completed_at: get(row, "completed_at")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            user_id: get(row, "user_id")?,
            quiz_id: get(row, "quiz_id")?,
        }),
        EntityKind::QuizAttemptAnswer => EntityRow::QuizAttemptAnswer(QuizAttemptAnswer {
            id: get(row, "id")?,
            selected_answer_id: get(row, "selected_answer_id")?,
            is_correct: get(row, "is_correct")?,
            created_at: get(row, "created_at")?,
            updated_at: get(row, "updated_at")?,
            attempt_id: get(row, "attempt_id")?,
            question_id: get(row, "question_id")?,
        }),
        EntityKind::FlashcardStudySession => {
            EntityRow::FlashcardStudySession(FlashcardStudySession {
                id: get(row, "id")?,
                score: get(row, "score")?,
                time_spent_seconds: get(row, "time_spent_seconds")?,
                created_at: get(row, "created_at")?,
                updated_at: get(row, "updated_at")?,
                flashcard_id: get(row, "flashcard_id")?,
            })
        }
    };
    Ok(decoded)
}

pub(crate) fn decode_user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: get(row, "id")?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        email: get(row, "email")?,
        password: get(row, "password")?,
        role: get_enum(row, EntityKind::User, "role")?,
        enabled: get(row, "enabled")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_with_identity() {
        let sql = insert_sql(EntityKind::QuizAnswer, true);
        assert_eq!(
            sql,
            "INSERT INTO quiz_answers (id, answer_text, is_correct, order_index, created_at, updated_at, question_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        );
    }

    #[test]
    fn test_insert_sql_returning_identity() {
        let sql = insert_sql(EntityKind::FlashcardStudySession, false);
        assert!(sql.starts_with("INSERT INTO flashcard_study_sessions (score,"));
        assert!(sql.contains("VALUES ($1, $2, $3, $4, $5)"));
        assert!(sql.ends_with("RETURNING id"));
    }

    #[test]
    fn test_select_sql_scopes() {
        let all = select_sql(EntityKind::Document, Scope::All);
        assert!(all.starts_with("SELECT t.id, t.title,"));
        assert!(all.ends_with("FROM documents t ORDER BY t.id"));

        let user = select_sql(EntityKind::QuizAnswer, Scope::User(3));
        assert!(user.contains("WHERE t.question_id IN (SELECT q.id FROM quiz_questions q"));
    }

    #[test]
    fn test_delete_sql() {
        assert_eq!(delete_sql(EntityKind::Quiz, Scope::All), "DELETE FROM quizzes");
        assert_eq!(
            delete_sql(EntityKind::Flashcard, Scope::User(1)),
            "DELETE FROM flashcards t WHERE t.user_id = $1"
        );
    }

    #[test]
    fn test_upsert_user_sql_updates_every_column() {
        let sql = upsert_user_sql();
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE SET"));
        for col in columns(EntityKind::User) {
            assert!(sql.contains(&format!("{} = EXCLUDED.{}", col, col)));
        }
    }

    #[test]
    fn test_update_sql() {
        assert_eq!(
            update_sql(EntityKind::QuizAttemptAnswer),
            "UPDATE quiz_attempt_answers SET selected_answer_id = $2, is_correct = $3, \
             created_at = $4, updated_at = $5, attempt_id = $6, question_id = $7 WHERE id = $1"
        );
    }

    #[test]
    fn test_sync_identity_sql() {
        let sql = sync_identity_sql(EntityKind::QuizAttempt);
        assert!(sql.contains("pg_get_serial_sequence('quiz_attempts', 'id')"));
        assert!(sql.contains("MAX(id) FROM quiz_attempts"));
    }

    #[test]
    fn test_column_count_matches_relations() {
        for kind in EntityKind::TOPOLOGICAL {
            let cols = columns(kind);
            for relation in kind.relations() {
                let snake: String = relation
                    .field
                    .chars()
                    .flat_map(|c| {
                        if c.is_ascii_uppercase() {
                            vec!['_', c.to_ascii_lowercase()]
                        } else {
                            vec![c]
                        }
                    })
                    .collect();
                assert!(cols.contains(&snake.as_str()), "{} lacks {}", kind, snake);
            }
        }
    }
}
