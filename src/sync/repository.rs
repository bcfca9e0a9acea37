//! Repository manager - owns the local git working tree.
//!
//! Creates or opens the repository, keeps the `origin` remote pointed at
//! the configured URL, turns the configured credentials into a [`GitAuth`]
//! and checks that the remote is reachable.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AuthMethod, SyncConfig};

use super::git::{GitAuth, GitError, GitOps, TOKEN_USERNAME};

/// The only remote the engine talks to.
pub const REMOTE_NAME: &str = "origin";

/// The only branch the engine tracks.
pub const BRANCH: &str = "master";

/// Remote-tracking ref of [`BRANCH`] after a fetch.
pub const REMOTE_BRANCH_REF: &str = "refs/remotes/origin/master";

/// Content of a freshly created `.gitignore`.
pub const GITIGNORE: &str = "*.tmp\n*.log\n";

/// Errors that can occur while resolving credentials.
#[derive(Error, Diagnostic, Debug)]
pub enum AuthError {
    #[error("{method} authentication requires a non-empty {field}")]
    #[diagnostic(
        code(draftsync::sync::auth::missing_field),
        help("Fill in the credentials for the selected auth_method")
    )]
    MissingField {
        method: AuthMethod,
        field: &'static str,
    },

    #[error("SSH key file not found: {path}")]
    #[diagnostic(code(draftsync::sync::auth::key_not_found))]
    KeyNotFound { path: String },
}

/// Errors that can occur while preparing the working tree.
#[derive(Error, Diagnostic, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    #[diagnostic(code(draftsync::sync::repository::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Git(#[from] GitError),
}

fn require(value: &str, method: AuthMethod, field: &'static str) -> Result<String, AuthError> {
    if value.trim().is_empty() {
        Err(AuthError::MissingField { method, field })
    } else {
        Ok(value.to_string())
    }
}

/// Build the credentials for the configured auth method.
pub fn resolve_auth(config: &SyncConfig) -> Result<GitAuth, AuthError> {
    let method = config.auth_method;
    match method {
        AuthMethod::Token => Ok(GitAuth::Basic {
            username: TOKEN_USERNAME.to_string(),
            password: require(&config.token, method, "token")?,
        }),
        AuthMethod::UserPass => Ok(GitAuth::Basic {
            username: require(&config.username, method, "username")?,
            password: require(&config.password, method, "password")?,
        }),
        AuthMethod::SshKey => {
            let path = require(&config.ssh_key_path, method, "ssh_key_path")?;
            if !Path::new(&path).is_file() {
                return Err(AuthError::KeyNotFound { path });
            }
            let passphrase = Some(config.ssh_key_passphrase.clone()).filter(|p| !p.is_empty());
            Ok(GitAuth::SshKey { path, passphrase })
        }
    }
}

/// Whether `ensure_repository` created a new repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResult {
    Created,
    Opened,
}

/// What `reconcile_remote` did to `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChange {
    Added,
    Replaced,
    Unchanged,
}

/// Owns the git working tree at `dir`.
pub struct RepoManager<G: GitOps> {
    git: G,
    dir: PathBuf,
}

impl<G: GitOps> RepoManager<G> {
    pub fn new(git: G, dir: PathBuf) -> Self {
        Self { git, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    /// Check if the working tree has been initialized.
    pub fn is_repository(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Create the directory and `.gitignore` when missing, then init or open
    /// the repository. Idempotent.
    pub fn ensure_repository(&self) -> Result<InitResult, RepositoryError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
        }

        let gitignore = self.dir.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, GITIGNORE)?;
        }

        if self.is_repository() {
            debug!(dir = %self.dir.display(), "Opened existing repository");
            return Ok(InitResult::Opened);
        }

        self.git.init(&self.dir, BRANCH)?;
        info!(dir = %self.dir.display(), "Initialized sync repository");
        Ok(InitResult::Created)
    }

    /// Point `origin` at `url`, replacing a remote with a different URL.
    pub fn reconcile_remote(&self, url: &str) -> Result<RemoteChange, GitError> {
        match self.git.remote_url(&self.dir, REMOTE_NAME)? {
            Some(current) if current == url => Ok(RemoteChange::Unchanged),
            Some(current) => {
                info!(from = %current, to = %url, "Replacing remote");
                self.git.remove_remote(&self.dir, REMOTE_NAME)?;
                self.git.add_remote(&self.dir, REMOTE_NAME, url)?;
                Ok(RemoteChange::Replaced)
            }
            None => {
                self.git.add_remote(&self.dir, REMOTE_NAME, url)?;
                Ok(RemoteChange::Added)
            }
        }
    }

    /// List the remote's refs. An empty remote is reachable.
    pub fn verify_connectivity(&self, auth: &GitAuth) -> Result<(), GitError> {
        let refs = self.git.list_remote(&self.dir, REMOTE_NAME, auth)?;
        debug!(refs = refs.len(), "Remote reachable");
        Ok(())
    }

    /// Whether the working tree has no uncommitted changes.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self.git.status_porcelain(&self.dir)?.trim().is_empty())
    }

    pub fn remote_url(&self) -> Result<Option<String>, GitError> {
        self.git.remote_url(&self.dir, REMOTE_NAME)
    }
}
