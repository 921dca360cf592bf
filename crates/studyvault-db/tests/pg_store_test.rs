//! PostgreSQL store tests.
//!
//! These need a running database (`DATABASE_URL`, see
//! `studyvault_db::test_fixtures::DEFAULT_TEST_DATABASE_URL`) and are ignored
//! by default. Run with `cargo test -p studyvault-db -- --ignored`.

use studyvault_db::test_fixtures::{two_user_graph, GraphBuilder, TestDatabase};
use studyvault_db::{BackupStore, EntityKind, EntityRow, Scope};

async fn seed(db: &TestDatabase, rows: &[EntityRow]) {
    let mut tx = db.store.begin_write().await.unwrap();
    for row in rows {
        tx.insert_with_id(row).await.unwrap();
    }
    for kind in EntityKind::TOPOLOGICAL {
        tx.sync_identity(kind).await.unwrap();
    }
    tx.commit().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_rows_round_trip_through_postgres() {
    let db = TestDatabase::new().await.unwrap();
    let rows = two_user_graph();
    seed(&db, &rows).await;

    let mut tx = db.store.begin_read().await.unwrap();
    for kind in EntityKind::TOPOLOGICAL {
        let expected: Vec<_> = rows.iter().filter(|r| r.kind() == kind).cloned().collect();
        let fetched = tx.fetch_rows(kind, Scope::All).await.unwrap();
        assert_eq!(fetched, expected, "rows of {}", kind);
    }
    tx.rollback().await.unwrap();
    db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_user_scope_follows_ownership_chain() {
    let db = TestDatabase::new().await.unwrap();
    seed(&db, &two_user_graph()).await;

    let mut tx = db.store.begin_read().await.unwrap();
    for kind in EntityKind::owned() {
        let rows = tx.fetch_rows(kind, Scope::User(2)).await.unwrap();
        assert!(!rows.is_empty(), "user 2 owns {}", kind);
        assert!(rows.iter().all(|r| r.id() > 10), "only user 2 rows for {}", kind);
    }
    tx.rollback().await.unwrap();
    db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_failed_row_keeps_transaction_usable() {
    let db = TestDatabase::new().await.unwrap();
    seed(&db, &GraphBuilder::new().user(1, "a@example.com").build()).await;

    let mut tx = db.store.begin_write().await.unwrap();
    let duplicate = GraphBuilder::new().user(1, "b@example.com").build();
    assert!(tx.insert_with_id(&duplicate[0]).await.is_err());

    let new_id = tx.insert(&duplicate[0]).await.unwrap();
    assert_eq!(new_id, 2);
    tx.commit().await.unwrap();

    let mut tx = db.store.begin_read().await.unwrap();
    assert_eq!(tx.fetch_rows(EntityKind::User, Scope::All).await.unwrap().len(), 2);
    tx.rollback().await.unwrap();
    db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_delete_sets_children_null() {
    let db = TestDatabase::new().await.unwrap();
    seed(
        &db,
        &GraphBuilder::new()
            .user(1, "a@example.com")
            .document(1, 1)
            .flashcard(1, 1, Some(1))
            .build(),
    )
    .await;

    let mut tx = db.store.begin_write().await.unwrap();
    assert_eq!(tx.delete_rows(EntityKind::Document, Scope::All).await.unwrap(), 1);
    let cards = tx.fetch_rows(EntityKind::Flashcard, Scope::All).await.unwrap();
    assert_eq!(cards[0].relations(), vec![(EntityKind::User, 1)]);
    tx.rollback().await.unwrap();
    db.cleanup().await;
}
