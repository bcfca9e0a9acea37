use tempfile::TempDir;

use crate::db::{Database, RecordRepository, SqliteDatabase};

async fn migrated() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

#[tokio::test(flavor = "multi_thread")]
async fn migrate_creates_record_tables() {
    let db = migrated().await;

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table'")
        .fetch_all(db.pool())
        .await
        .unwrap();

    for table in ["documents", "extensions", "key_bindings", "themes"] {
        assert!(names.iter().any(|n| n == table), "{} missing from {:?}", table, names);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn migrate_twice_keeps_store_usable() {
    let db = migrated().await;
    db.migrate().await.unwrap();

    assert!(db.documents().query_all().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn open_writes_store_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("store.db");

    let db = SqliteDatabase::open(&path).await.unwrap();
    db.migrate().await.unwrap();

    assert!(path.exists());
}
