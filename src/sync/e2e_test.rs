//! Two replicas syncing through a local bare repository with the real git
//! binary. Skipped when git is not installed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::config::{MemoryConfig, SyncConfig};
use crate::db::{Database, Document, RecordMeta, RecordRepository, SqliteDatabase};
use crate::sync::git::{PushOutcome, RealGit};
use crate::sync::manager::{FetchOutcome, SyncError, SyncManager};
use crate::sync::test_support::{git, git_available, init_bare, memory_db};

type Replica = SyncManager<SqliteDatabase, RealGit, MemoryConfig>;

async fn replica(root: &Path, name: &str, remote: &Path) -> Replica {
    let config = SyncConfig {
        enabled: true,
        repo_url: remote.display().to_string(),
        token: "unused".to_string(),
        ..SyncConfig::default()
    };
    SyncManager::with_sync_dir(
        memory_db().await,
        RealGit::new(),
        Arc::new(MemoryConfig::new(config)),
        root.join(name).join("backup"),
    )
}

fn setup() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let remote = temp.path().join("remote.git");
    init_bare(&remote);
    (temp, remote)
}

async fn create_document(replica: &Replica, uuid: &str, updated_at: &str, title: &str) {
    replica
        .database()
        .documents()
        .create(&Document::new(RecordMeta::at(uuid, updated_at), title, "body"))
        .await
        .unwrap();
}

async fn edit_document(replica: &Replica, uuid: &str, edit: impl FnOnce(&mut Document)) {
    let repo = replica.database().documents();
    let mut doc = repo.find_by_uuid(uuid).await.unwrap().unwrap();
    edit(&mut doc);
    repo.update_by_uuid(&doc).await.unwrap();
}

async fn document(replica: &Replica, uuid: &str) -> Document {
    replica
        .database()
        .documents()
        .find_by_uuid(uuid)
        .await
        .unwrap()
        .unwrap()
}

fn commit_count(dir: &Path) -> u32 {
    git(dir, &["rev-list", "--count", "HEAD"]).trim().parse().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_sync_and_idempotence() {
    if !git_available() {
        return;
    }
    let (temp, remote) = setup();
    let a = replica(temp.path(), "a", &remote).await;
    create_document(&a, "A", "2024-01-01T00:00:00Z", "x").await;

    let first = a.sync().await.unwrap();

    assert_eq!(first.fetch, FetchOutcome::NoRemoteBranch);
    assert!(first.committed);
    assert_eq!(first.push, Some(PushOutcome::Pushed));
    git(&remote, &["rev-parse", "--verify", "refs/heads/master"]);
    let commits = commit_count(a.sync_dir());

    let second = a.sync().await.unwrap();

    assert_eq!(second.fetch, FetchOutcome::UpToDate);
    assert!(!second.committed);
    assert_eq!(second.push, Some(PushOutcome::UpToDate));
    assert_eq!(commit_count(a.sync_dir()), commits);

    let status = a.status().await.unwrap();
    assert!(status.ready);
    assert_eq!(status.clean, Some(true));
    assert_eq!(status.snapshot_counts.documents, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_changes_propagate_between_replicas() {
    if !git_available() {
        return;
    }
    let (temp, remote) = setup();
    let a = replica(temp.path(), "a", &remote).await;
    let b = replica(temp.path(), "b", &remote).await;
    create_document(&a, "A", "2024-01-01T00:00:00Z", "x").await;
    a.sync().await.unwrap();

    // A replica with no history starts from the remote branch.
    let joined = b.sync().await.unwrap();
    assert_eq!(joined.fetch, FetchOutcome::CheckedOut);
    assert_eq!(joined.import.documents.created, 1);
    assert!(!joined.committed);
    assert_eq!(document(&b, "A").await.title, "x");

    edit_document(&b, "A", |doc| {
        doc.title = "y".to_string();
        doc.meta.updated_at = "2030-01-01T00:00:00Z".to_string();
    })
    .await;
    b.sync().await.unwrap();

    let pulled = a.sync().await.unwrap();
    assert_eq!(pulled.fetch, FetchOutcome::FastForwarded);
    assert_eq!(pulled.import.documents.updated, 1);
    assert_eq!(document(&a, "A").await.title, "y");

    // Tombstones travel like any other edit.
    edit_document(&a, "A", |doc| {
        doc.meta.deleted_at = Some("2030-02-01T00:00:00Z".to_string());
        doc.meta.updated_at = "2030-02-01T00:00:00Z".to_string();
    })
    .await;
    a.sync().await.unwrap();
    b.sync().await.unwrap();

    let deleted = document(&b, "A").await;
    assert!(deleted.meta.is_deleted());
    assert_eq!(deleted.meta.updated_at, "2030-02-01T00:00:00Z");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_diverged_replicas_resolve_by_last_write() {
    if !git_available() {
        return;
    }
    let (temp, remote) = setup();
    let a = replica(temp.path(), "a", &remote).await;
    let b = replica(temp.path(), "b", &remote).await;
    create_document(&a, "A", "2024-01-01T00:00:00Z", "x").await;
    a.sync().await.unwrap();
    b.sync().await.unwrap();

    edit_document(&a, "A", |doc| {
        doc.title = "from a".to_string();
        doc.meta.updated_at = "2030-02-01T00:00:00Z".to_string();
    })
    .await;
    a.sync().await.unwrap();

    // B commits an older edit while the remote is unreachable.
    let offline = temp.path().join("offline.git");
    std::fs::rename(&remote, &offline).unwrap();
    edit_document(&b, "A", |doc| {
        doc.title = "from b".to_string();
        doc.meta.updated_at = "2030-01-01T00:00:00Z".to_string();
    })
    .await;
    let result = b.sync().await;
    assert!(matches!(result, Err(SyncError::Transport(_))));
    std::fs::rename(&offline, &remote).unwrap();

    let report = b.sync().await.unwrap();

    assert_eq!(
        report.fetch,
        FetchOutcome::Resolved {
            files: vec!["documents.jsonl".to_string()]
        }
    );
    assert_eq!(report.push, Some(PushOutcome::Pushed));
    let merged = document(&b, "A").await;
    assert_eq!(merged.title, "from a");
    assert_eq!(merged.meta.updated_at, "2030-02-01T00:00:00Z");

    let snapshot = std::fs::read_to_string(b.sync_dir().join("documents.jsonl")).unwrap();
    assert!(!snapshot.contains("<<<<<<<"));

    a.sync().await.unwrap();
    assert_eq!(document(&a, "A").await.title, "from a");
    assert_eq!(a.status().await.unwrap().clean, Some(true));
}
