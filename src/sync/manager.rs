//! Sync manager - high-level sync operations.
//!
//! Owns the repository, the store and the configuration source, and runs
//! one sync cycle at a time:
//!
//! ```text
//! Idle -> Initializing -> FetchMerge -> Import -> Export -> Commit -> Push -> Idle
//!                              ^                                      |
//!                              +------- non-fast-forward push --------+
//! ```
//!
//! `FetchMerge` and `Import` failures are recoverable: they are logged and
//! the cycle continues. Every other failure ends the cycle in `Failed`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, Utc};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, ConfigSource, SyncConfig};
use crate::db::{Database, DbError, RecordRepository, Table, TableCounts};

use super::{
    conflict,
    export::{ExportError, ExportSummary, export_all},
    git::{GitAuth, GitError, GitOps, MergeOutcome, PushOutcome},
    import::{ImportSummary, import_all},
    jsonl::{JsonlError, count_records},
    paths::get_backup_dir,
    repository::{
        AuthError, BRANCH, REMOTE_BRANCH_REF, REMOTE_NAME, RepoManager, RepositoryError,
        resolve_auth,
    },
};

/// Pushes attempted before giving up on a remote that keeps moving.
pub const MAX_PUSH_ATTEMPTS: u32 = 3;

/// Message of the commit that records repaired conflict blocks.
pub const CONFLICT_COMMIT_MESSAGE: &str = "Auto-resolve sync conflicts";

/// Errors that can occur during sync operations.
#[derive(Error, Diagnostic, Debug)]
pub enum SyncError {
    #[error("Sync is not initialized")]
    #[diagnostic(
        code(draftsync::sync::not_initialized),
        help("Enable sync and configure a repository URL, then run `draftsync init`")
    )]
    NotInitialized,

    #[error("Sync is disabled")]
    #[diagnostic(
        code(draftsync::sync::disabled),
        help("Set `enabled: true` in the configuration file")
    )]
    Disabled,

    #[error("Invalid sync configuration: {message}")]
    #[diagnostic(code(draftsync::sync::config_invalid))]
    ConfigInvalid { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),

    #[error("Remote operation failed: {0}")]
    #[diagnostic(code(draftsync::sync::transport))]
    Transport(#[source] GitError),

    #[error("Could not resolve conflicts in {file}: {message}")]
    #[diagnostic(
        code(draftsync::sync::conflict_unresolved),
        help("The merge was aborted; fix the snapshot file on the remote or locally and sync again")
    )]
    ConflictUnresolved { file: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error("Failed to commit snapshot: {0}")]
    #[diagnostic(code(draftsync::sync::commit))]
    Commit(#[source] GitError),

    #[error("Push failed after {attempts} attempts")]
    #[diagnostic(
        code(draftsync::sync::push_exhausted),
        help("Another replica keeps pushing; try again later")
    )]
    PushExhausted { attempts: u32 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Jsonl(#[from] JsonlError),
}

/// A git failure inside the working tree, as opposed to talking to the remote.
fn local(error: GitError) -> SyncError {
    SyncError::Repository(error.into())
}

/// How a failed step affects the rest of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged as a warning; the cycle goes on.
    Recoverable,
    /// Ends the cycle and is returned to the caller.
    Fatal,
}

/// The steps of a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchMerge,
    Import,
    Export,
    Commit,
    Push,
}

impl Step {
    pub fn severity(self) -> Severity {
        match self {
            Step::FetchMerge | Step::Import => Severity::Recoverable,
            Step::Export | Step::Commit | Step::Push => Severity::Fatal,
        }
    }

    fn phase(self) -> SyncPhase {
        match self {
            Step::FetchMerge => SyncPhase::FetchMerge,
            Step::Import => SyncPhase::Import,
            Step::Export => SyncPhase::Export,
            Step::Commit => SyncPhase::Commit,
            Step::Push => SyncPhase::Push,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::FetchMerge => "fetch-merge",
            Step::Import => "import",
            Step::Export => "export",
            Step::Commit => "commit",
            Step::Push => "push",
        };
        f.write_str(name)
    }
}

/// Where the manager currently is.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Initializing,
    FetchMerge,
    Import,
    Export,
    Commit,
    Push,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Initializing => "initializing",
            SyncPhase::FetchMerge => "fetch_merge",
            SyncPhase::Import => "import",
            SyncPhase::Export => "export",
            SyncPhase::Commit => "commit",
            SyncPhase::Push => "push",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the fetch-merge step did to the local branch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FetchOutcome {
    /// The step failed and was skipped.
    #[default]
    Skipped,
    /// Nothing has been pushed to the remote yet.
    NoRemoteBranch,
    /// The local branch had no commits and now starts at the remote branch.
    CheckedOut,
    /// The local branch already contains the remote branch.
    UpToDate,
    FastForwarded,
    Merged,
    /// The merge conflicted and the listed snapshot files were repaired.
    Resolved { files: Vec<String> },
}

/// Final result of the last sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Succeeded,
    Failed,
}

/// What a successful sync cycle did.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub fetch: FetchOutcome,
    pub import: ImportSummary,
    pub export: ExportSummary,
    /// Whether a new snapshot commit was created.
    pub committed: bool,
    pub push: Option<PushOutcome>,
    pub push_attempts: u32,
    /// Recoverable failures that were logged and skipped.
    pub warnings: Vec<String>,
}

/// Snapshot of the manager's state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub ready: bool,
    pub running: bool,
    pub phase: SyncPhase,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_result: Option<SyncOutcome>,
    pub last_error: Option<String>,
    /// Configured repository URL.
    pub repo_url: String,
    /// URL of `origin` in the working tree, if any.
    pub remote_url: Option<String>,
    pub repository: bool,
    /// `None` when the repository does not exist yet.
    pub clean: Option<bool>,
    pub sync_dir: PathBuf,
    pub auto_sync_minutes: Option<u64>,
    pub db_counts: TableCounts,
    pub snapshot_counts: TableCounts,
}

#[derive(Debug, Default)]
struct SyncState {
    phase: SyncPhase,
    last_sync_at: Option<DateTime<Utc>>,
    last_result: Option<SyncOutcome>,
    last_error: Option<String>,
}

/// Sync manager handles all sync operations.
pub struct SyncManager<D: Database, G: GitOps, C: ConfigSource> {
    db: D,
    repo: RepoManager<G>,
    config: Arc<C>,
    initialized: AtomicBool,
    sync_lock: tokio::sync::Mutex<()>,
    state: Mutex<SyncState>,
}

impl<D: Database, G: GitOps, C: ConfigSource> SyncManager<D, G, C> {
    /// Create a sync manager working in the default backup directory.
    pub fn new(db: D, git: G, config: Arc<C>) -> Self {
        Self::with_sync_dir(db, git, config, get_backup_dir(None))
    }

    /// Create a sync manager with a custom sync directory.
    pub fn with_sync_dir(db: D, git: G, config: Arc<C>, sync_dir: PathBuf) -> Self {
        Self {
            db,
            repo: RepoManager::new(git, sync_dir),
            config,
            initialized: AtomicBool::new(false),
            sync_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn sync_dir(&self) -> &Path {
        self.repo.dir()
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn config(&self) -> &Arc<C> {
        &self.config
    }

    /// Whether initialization has succeeded since the last reset.
    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Forget readiness so the next sync initializes again.
    pub fn reset(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: SyncPhase) {
        debug!(phase = %phase, "Sync phase");
        self.state().phase = phase;
    }

    /// Prepare the repository: create or open it, point `origin` at the
    /// configured URL, resolve credentials and check the remote answers.
    ///
    /// Returns `Ok(false)` without touching anything while sync is disabled
    /// or has no repository URL.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<bool, SyncError> {
        let config = self.config.load()?;
        if !config.is_active() {
            debug!("Sync inactive, skipping initialization");
            self.reset();
            return Ok(false);
        }

        let _guard = self.sync_lock.lock().await;
        self.set_phase(SyncPhase::Initializing);
        match self.prepare(&config) {
            Ok(()) => {
                self.initialized.store(true, Ordering::SeqCst);
                self.set_phase(SyncPhase::Idle);
                info!(url = %config.repo_url, "Sync initialized");
                Ok(true)
            }
            Err(e) => {
                self.reset();
                let mut state = self.state();
                state.phase = SyncPhase::Failed;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn prepare(&self, config: &SyncConfig) -> Result<(), SyncError> {
        self.repo.ensure_repository()?;
        self.repo.reconcile_remote(&config.repo_url).map_err(local)?;
        let auth = resolve_auth(config)?;
        self.repo
            .verify_connectivity(&auth)
            .map_err(SyncError::Transport)
    }

    /// Run one full sync cycle.
    ///
    /// Only one cycle runs at a time; a second caller waits for the first
    /// to finish.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let config = self.config.load()?;
        if !config.enabled {
            return Err(SyncError::Disabled);
        }
        if config.repo_url.trim().is_empty() {
            return Err(SyncError::ConfigInvalid {
                message: "repository URL is not configured".to_string(),
            });
        }

        if !self.is_ready() && !self.initialize().await? {
            return Err(SyncError::NotInitialized);
        }

        let _guard = self.sync_lock.lock().await;
        let result = self.run_cycle(&config).await;

        let mut state = self.state();
        state.last_sync_at = Some(Utc::now());
        match &result {
            Ok(report) => {
                state.phase = SyncPhase::Idle;
                state.last_result = Some(SyncOutcome::Succeeded);
                state.last_error = None;
                info!(
                    committed = report.committed,
                    push_attempts = report.push_attempts,
                    warnings = report.warnings.len(),
                    "Sync finished"
                );
            }
            Err(e) => {
                state.phase = SyncPhase::Failed;
                state.last_result = Some(SyncOutcome::Failed);
                state.last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn run_cycle(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        let auth = resolve_auth(config)?;
        let mut report = SyncReport::default();

        self.set_phase(Step::FetchMerge.phase());
        report.fetch = settle(Step::FetchMerge, self.fetch_merge(&auth), &mut report.warnings)?;

        self.set_phase(Step::Import.phase());
        report.import = import_all(&self.db, self.repo.dir()).await;
        if !report.import.is_clean() {
            for (table, error) in &report.import.failures {
                report
                    .warnings
                    .push(format!("{}: {}: {}", Step::Import, table, error));
            }
        }
        debug!(changed = report.import.changed(), "Import finished");

        self.set_phase(Step::Export.phase());
        let exported = export_all(&self.db, self.repo.dir())
            .await
            .map_err(SyncError::from);
        report.export = settle(Step::Export, exported, &mut report.warnings)?;
        debug!(records = report.export.total(), "Export finished");

        self.set_phase(Step::Commit.phase());
        report.committed = settle(Step::Commit, self.commit_snapshot(), &mut report.warnings)?;

        self.set_phase(Step::Push.phase());
        let pushed = self.push_with_retry(&auth).map(Some);
        if let Some((outcome, attempts)) = settle(Step::Push, pushed, &mut report.warnings)? {
            report.push = Some(outcome);
            report.push_attempts = attempts;
        }

        Ok(report)
    }

    /// Bring the remote branch into the local one.
    fn fetch_merge(&self, auth: &GitAuth) -> Result<FetchOutcome, SyncError> {
        let git = self.repo.git();
        let dir = self.repo.dir();

        git.fetch(dir, REMOTE_NAME, auth)
            .map_err(SyncError::Transport)?;

        let Some(remote_head) = git.resolve_ref(dir, REMOTE_BRANCH_REF).map_err(local)? else {
            debug!("Remote has no {} branch yet", BRANCH);
            return Ok(FetchOutcome::NoRemoteBranch);
        };

        let Some(local_head) = git.resolve_ref(dir, "HEAD").map_err(local)? else {
            git.checkout_branch(dir, BRANCH, REMOTE_BRANCH_REF)
                .map_err(local)?;
            info!("Checked out remote branch into empty repository");
            return Ok(FetchOutcome::CheckedOut);
        };

        if local_head == remote_head
            || git
                .is_ancestor(dir, &remote_head, &local_head)
                .map_err(local)?
        {
            return Ok(FetchOutcome::UpToDate);
        }

        if git
            .is_ancestor(dir, &local_head, &remote_head)
            .map_err(local)?
        {
            git.merge(dir, REMOTE_BRANCH_REF, true).map_err(local)?;
            debug!("Fast-forwarded to remote branch");
            return Ok(FetchOutcome::FastForwarded);
        }

        match git.merge(dir, REMOTE_BRANCH_REF, false).map_err(local)? {
            MergeOutcome::Merged => {
                debug!("Merged remote branch");
                Ok(FetchOutcome::Merged)
            }
            MergeOutcome::Conflicted(files) => {
                warn!(files = ?files, "Merge conflicted, resolving snapshot files");
                let result = self.resolve_conflicts(files);
                if let Err(e) = &result {
                    warn!(error = %e, "Conflict resolution failed, aborting merge");
                    if let Err(e) = git.abort_merge(dir) {
                        warn!(error = %e, "Failed to abort merge");
                    }
                }
                result
            }
        }
    }

    fn resolve_conflicts(&self, files: Vec<String>) -> Result<FetchOutcome, SyncError> {
        let git = self.repo.git();
        let dir = self.repo.dir();

        for file in &files {
            if !file.ends_with(".jsonl") {
                return Err(SyncError::ConflictUnresolved {
                    file: file.clone(),
                    message: "not a snapshot file".to_string(),
                });
            }
            conflict::resolve_file(&dir.join(file)).map_err(|e| {
                SyncError::ConflictUnresolved {
                    file: file.clone(),
                    message: e.to_string(),
                }
            })?;
        }

        git.add_files(dir, &files).map_err(local)?;
        if let Some(file) = git.unmerged_files(dir).map_err(local)?.into_iter().next() {
            return Err(SyncError::ConflictUnresolved {
                file,
                message: "still unmerged after resolution".to_string(),
            });
        }

        git.commit(dir, CONFLICT_COMMIT_MESSAGE)
            .map_err(SyncError::Commit)?;
        info!(files = files.len(), "Resolved snapshot conflicts");
        Ok(FetchOutcome::Resolved { files })
    }

    /// Stage the snapshot files and commit them if anything changed.
    fn commit_snapshot(&self) -> Result<bool, SyncError> {
        let git = self.repo.git();
        let dir = self.repo.dir();

        let mut files: Vec<String> = Table::ALL
            .iter()
            .map(|t| t.file_name())
            .filter(|name| dir.join(name).exists())
            .map(str::to_string)
            .collect();
        if dir.join(".gitignore").exists() {
            files.push(".gitignore".to_string());
        }
        if files.is_empty() {
            return Ok(false);
        }

        git.add_files(dir, &files).map_err(SyncError::Commit)?;
        if !git.has_staged_changes(dir).map_err(SyncError::Commit)? {
            debug!("Snapshot unchanged, nothing to commit");
            return Ok(false);
        }

        let message = format!("Backup {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        git.commit(dir, &message).map_err(SyncError::Commit)?;
        info!(message = %message, "Committed snapshot");
        Ok(true)
    }

    /// Push, merging the remote and retrying when it moved ahead.
    fn push_with_retry(&self, auth: &GitAuth) -> Result<(PushOutcome, u32), SyncError> {
        let git = self.repo.git();
        let dir = self.repo.dir();

        for attempt in 1..=MAX_PUSH_ATTEMPTS {
            match git.push(dir, REMOTE_NAME, BRANCH, auth) {
                Ok(outcome) => {
                    debug!(attempt, outcome = ?outcome, "Push finished");
                    return Ok((outcome, attempt));
                }
                Err(GitError::NonFastForward) => {
                    warn!(attempt, "Push rejected, remote has new commits");
                    if attempt == MAX_PUSH_ATTEMPTS {
                        break;
                    }
                    self.fetch_merge(auth)?;
                    self.commit_snapshot()?;
                }
                Err(e) => return Err(SyncError::Transport(e)),
            }
        }

        Err(SyncError::PushExhausted {
            attempts: MAX_PUSH_ATTEMPTS,
        })
    }

    /// Current readiness, progress and record counts.
    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let config = self.config.load()?;
        let repository = self.repo.is_repository();
        let (remote_url, clean) = if repository {
            (
                self.repo.remote_url().map_err(local)?,
                Some(self.repo.is_clean().map_err(local)?),
            )
        } else {
            (None, None)
        };

        let mut snapshot_counts = TableCounts::default();
        for table in Table::ALL {
            let count = count_records(&self.repo.dir().join(table.file_name()))?;
            snapshot_counts.set(table, count);
        }

        let mut db_counts = TableCounts::default();
        db_counts.set(Table::Documents, self.db.documents().query_all().await?.len());
        db_counts.set(Table::Extensions, self.db.extensions().query_all().await?.len());
        db_counts.set(Table::KeyBindings, self.db.key_bindings().query_all().await?.len());
        db_counts.set(Table::Themes, self.db.themes().query_all().await?.len());

        let state = self.state();
        Ok(SyncStatus {
            enabled: config.enabled,
            ready: self.is_ready(),
            running: self.sync_lock.try_lock().is_err(),
            phase: state.phase,
            last_sync_at: state.last_sync_at,
            last_result: state.last_result,
            last_error: state.last_error.clone(),
            repo_url: config.repo_url.clone(),
            remote_url,
            repository,
            clean,
            sync_dir: self.repo.dir().to_path_buf(),
            auto_sync_minutes: config
                .auto_sync_interval()
                .map(|_| config.backup_interval),
            db_counts,
            snapshot_counts,
        })
    }
}

/// Apply a step's severity to its result: recoverable failures become a
/// warning and the step's default value.
fn settle<T: Default>(
    step: Step,
    result: Result<T, SyncError>,
    warnings: &mut Vec<String>,
) -> Result<T, SyncError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => match step.severity() {
            Severity::Recoverable => {
                warn!(step = %step, error = %e, "Sync step failed, continuing");
                warnings.push(format!("{}: {}", step, e));
                Ok(T::default())
            }
            Severity::Fatal => Err(e),
        },
    }
}
