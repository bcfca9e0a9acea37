use crate::db::{
    Database, Document, Extension, KeyBinding, RecordMeta, RecordRepository, Table, Theme,
    ThemeType,
};
use crate::sync::export::*;
use crate::sync::test_support::memory_db;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread")]
async fn test_export_empty_database() {
    let db = memory_db().await;
    let temp_dir = TempDir::new().unwrap();

    let summary = export_all(&db, temp_dir.path()).await.unwrap();

    assert_eq!(summary.total(), 0);
    for table in Table::ALL {
        let path = temp_dir.path().join(table.file_name());
        assert!(path.exists(), "File {} should exist", table.file_name());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_with_data_includes_deleted_records() {
    let db = memory_db().await;
    let temp_dir = TempDir::new().unwrap();

    let mut deleted = Document::new(RecordMeta::at("b", "2024-01-02T00:00:00Z"), "Old", "");
    deleted.meta.deleted_at = Some("2024-01-02T00:00:00Z".to_string());
    db.documents().create(&deleted).await.unwrap();
    db.documents()
        .create(&Document::new(
            RecordMeta::at("a", "2024-01-01T00:00:00Z"),
            "New",
            "",
        ))
        .await
        .unwrap();
    db.themes()
        .create(&Theme {
            meta: RecordMeta::at("t", "2024-01-01T00:00:00Z"),
            key: "nord".to_string(),
            theme_type: ThemeType::Dark,
            colors: None,
        })
        .await
        .unwrap();

    let summary = export_all(&db, temp_dir.path()).await.unwrap();

    assert_eq!(summary.documents, 2);
    assert_eq!(summary.themes, 1);
    assert_eq!(summary.total(), 3);

    let content = std::fs::read_to_string(temp_dir.path().join("documents.jsonl")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"uuid\":\"a\""));
    assert!(lines[1].contains("\"deleted_at\":\"2024-01-02T00:00:00Z\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_is_stable_across_runs() {
    let db = memory_db().await;
    let temp_dir = TempDir::new().unwrap();
    db.extensions()
        .create(&Extension {
            meta: RecordMeta::at("e", "2024-01-01T00:00:00Z"),
            key: "vim".to_string(),
            enabled: true,
            config: None,
        })
        .await
        .unwrap();
    db.key_bindings()
        .create(&KeyBinding {
            meta: RecordMeta::at("k", "2024-01-01T00:00:00Z"),
            key: "Mod-s".to_string(),
            command: "save".to_string(),
            extension: String::new(),
            enabled: true,
        })
        .await
        .unwrap();

    export_all(&db, temp_dir.path()).await.unwrap();
    let first = std::fs::read_to_string(temp_dir.path().join("keybindings.jsonl")).unwrap();
    export_all(&db, temp_dir.path()).await.unwrap();
    let second = std::fs::read_to_string(temp_dir.path().join("keybindings.jsonl")).unwrap();

    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_into_missing_directory_fails() {
    let db = memory_db().await;
    let temp_dir = TempDir::new().unwrap();

    let result = export_all(&db, &temp_dir.path().join("missing")).await;

    assert!(matches!(
        result,
        Err(ExportError::Jsonl {
            table: Table::Documents,
            ..
        })
    ));
}
