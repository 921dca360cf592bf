//! Integration tests for the snapshot document format and row conversion.

use studyvault_core::{
    validate_snapshot, DatabaseSnapshot, EntityKind, EntityRow, Snapshot, SnapshotTables,
    CURRENT_SNAPSHOT_VERSION,
};
use serde_json::json;

fn sample_snapshot() -> serde_json::Value {
    json!({
        "backupTimestamp": "2026-06-30T02:00:00",
        "version": "1.0",
        "users": [{
            "id": 1, "firstName": "Ada", "lastName": "Lovelace",
            "email": "ada@example.com", "password": "$2a$10$abc",
            "role": "ADMIN", "enabled": true,
            "createdAt": "2026-01-01T09:00:00", "updatedAt": null
        }],
        "documents": [{
            "id": 10, "title": "Notes", "fileSize": 2048,
            "processingStatus": "COMPLETED", "userId": 1
        }],
        "flashcards": [{
            "id": 20, "question": "2+2?", "answer": "4",
            "difficulty": "EASY", "userId": 1, "documentId": 10
        }],
        "quizzes": [{"id": 30, "title": "Math", "userId": 1, "documentId": 10}],
        "quizQuestions": [{
            "id": 40, "questionText": "1+1?", "questionType": "SHORT_ANSWER",
            "points": 2, "order": 0, "quizId": 30
        }],
        "quizAnswers": [{"id": 50, "answerText": "2", "isCorrect": true, "order": 0, "questionId": 40}],
        "quizAttempts": [{
            "id": 60, "score": 2.0, "maxScore": 2.0, "timeSpentMinutes": 3,
            "completedAt": "2026-06-01T12:00:00", "userId": 1, "quizId": 30
        }],
        "quizAttemptAnswers": [{
            "id": 70, "selectedAnswerId": 50, "isCorrect": true,
            "attemptId": 60, "questionId": 40
        }],
        "flashcardStudySessions": [{"id": 80, "score": 1.0, "timeSpentSeconds": 30, "flashcardId": 20}]
    })
}

#[test]
fn test_every_row_converts_to_typed_record_and_back() {
    let snapshot = Snapshot::from_slice(sample_snapshot().to_string().as_bytes()).unwrap();

    for kind in EntityKind::TOPOLOGICAL {
        let rows = snapshot.rows(kind);
        assert_eq!(rows.len(), 1, "one row of {}", kind);

        let typed = EntityRow::from_field_map(kind, &rows[0]).unwrap();
        assert_eq!(typed.kind(), kind);

        let again = EntityRow::from_field_map(kind, &typed.to_field_map().unwrap()).unwrap();
        assert_eq!(again, typed);
    }
}

#[test]
fn test_relations_read_from_snapshot_rows() {
    let snapshot = Snapshot::from_slice(sample_snapshot().to_string().as_bytes()).unwrap();
    let answer =
        EntityRow::from_field_map(EntityKind::QuizAttemptAnswer, &snapshot.rows(EntityKind::QuizAttemptAnswer)[0])
            .unwrap();
    assert_eq!(
        answer.relations(),
        vec![
            (EntityKind::QuizAttempt, 60),
            (EntityKind::QuizQuestion, 40),
            (EntityKind::QuizAnswer, 50),
        ]
    );
}

#[test]
fn test_sample_snapshot_is_valid() {
    let snapshot = Snapshot::from_slice(sample_snapshot().to_string().as_bytes()).unwrap();
    let report = validate_snapshot(&snapshot);
    assert!(report.valid, "{:?}", report.errors);
    assert!(report.warnings.is_empty());
}

#[test]
fn test_reserialized_snapshot_parses_identically() {
    let snapshot = Snapshot::from_slice(sample_snapshot().to_string().as_bytes()).unwrap();
    let bytes = snapshot.to_vec_pretty().unwrap();
    let parsed = Snapshot::from_slice(&bytes).unwrap();
    assert_eq!(parsed, snapshot);
}

#[test]
fn test_empty_database_snapshot() {
    let snapshot = Snapshot::Database(DatabaseSnapshot {
        backup_timestamp: chrono::NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        version: CURRENT_SNAPSHOT_VERSION.to_string(),
        users: Vec::new(),
        tables: SnapshotTables::default(),
    });
    assert!(snapshot.counts().iter().all(|(_, n)| *n == 0));
    assert!(validate_snapshot(&snapshot).valid);
}
