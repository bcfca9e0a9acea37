//! Sync module - Git-based synchronization of the draftsync store.
//!
//! Every table is exported to a JSONL snapshot inside a git working tree,
//! which is merged with a single remote branch. Records are reconciled by
//! uuid with last-write-wins on `updated_at`, both when importing snapshots
//! and when repairing conflicted snapshot files.

mod conflict;
#[cfg(test)]
mod e2e_test;
mod export;
#[cfg(test)]
mod export_test;
mod git;
#[cfg(test)]
mod git_test;
mod import;
mod jsonl;
mod lww;
mod manager;
mod paths;
mod repository;
#[cfg(test)]
mod repository_test;
mod scheduler;
mod service;
#[cfg(test)]
mod test_support;

pub use conflict::{ConflictError, has_conflict_markers, resolve_content, resolve_file};
pub use export::{ExportError, ExportSummary, export_all};
#[cfg(test)]
pub use git::MockGitOps;
pub use git::{GitAuth, GitError, GitOps, MergeOutcome, PushOutcome, RealGit};
pub use import::{ImportError, ImportSummary, TableImport, import_all, import_table};
pub use jsonl::{JsonlError, count_records, read_jsonl, write_jsonl};
pub use lww::remote_wins;
pub use manager::{
    FetchOutcome, MAX_PUSH_ATTEMPTS, Severity, Step, SyncError, SyncManager, SyncOutcome,
    SyncPhase, SyncReport, SyncStatus,
};
pub use paths::{get_backup_dir, get_config_path, get_data_dir, get_db_path};
pub use repository::{AuthError, InitResult, RemoteChange, RepoManager, RepositoryError, resolve_auth};
pub use scheduler::AutoSync;
pub use service::SyncService;
