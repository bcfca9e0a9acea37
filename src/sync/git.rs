//! Git operations for sync functionality.
//!
//! This module provides a trait-based abstraction over git commands
//! to enable easy mocking in tests. [`RealGit`] shells out to the `git`
//! binary and turns exit codes and machine-readable output into typed
//! results, so callers never look at human-readable error text.

use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempPath;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Identity used for every commit made by the engine.
pub const COMMIT_AUTHOR_NAME: &str = "draftsync";
pub const COMMIT_AUTHOR_EMAIL: &str = "backup@draftsync.local";

/// Username sent with token authentication.
pub const TOKEN_USERNAME: &str = "git";

const CREDENTIAL_HELPER: &str = "!f() { test \"$1\" = get && echo \"username=${DRAFTSYNC_GIT_USERNAME}\" && echo \"password=${DRAFTSYNC_GIT_PASSWORD}\"; }; f";

const ASKPASS_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$DRAFTSYNC_SSH_PASSPHRASE\"\n";

/// Errors that can occur during git operations.
#[derive(Error, Diagnostic, Debug)]
pub enum GitError {
    #[error("Git command failed: {0}")]
    #[diagnostic(code(draftsync::sync::git::command_failed))]
    CommandFailed(String),

    #[error("Git command returned non-zero exit code {code}: {output}")]
    #[diagnostic(code(draftsync::sync::git::non_zero_exit))]
    NonZeroExit { code: i32, output: String },

    #[error("Git not installed or not in PATH")]
    #[diagnostic(code(draftsync::sync::git::not_found))]
    GitNotFound,

    #[error("Push rejected: remote has commits that are not present locally")]
    #[diagnostic(
        code(draftsync::sync::git::non_fast_forward),
        help("Fetch and merge the remote branch, then push again")
    )]
    NonFastForward,

    #[error("Push rejected by remote: {reason}")]
    #[diagnostic(code(draftsync::sync::git::push_rejected))]
    PushRejected { reason: String },
}

/// Credentials for talking to the remote.
#[derive(Clone, PartialEq, Eq)]
pub enum GitAuth {
    /// HTTP basic auth, also used for tokens.
    Basic { username: String, password: String },
    /// SSH private key, optionally passphrase protected.
    SshKey {
        path: String,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            GitAuth::SshKey { path, passphrase } => f
                .debug_struct("SshKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

/// Result of merging a revision into the current branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// The merge stopped with these paths unmerged.
    Conflicted(Vec<String>),
}

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed,
    UpToDate,
}

/// Trait for git operations. Can be mocked in tests.
#[cfg_attr(test, automock)]
pub trait GitOps: Send + Sync {
    /// Initialize a git repository whose unborn branch is `branch`.
    fn init(&self, path: &Path, branch: &str) -> Result<(), GitError>;

    /// URL of a remote, `None` when it does not exist.
    fn remote_url(&self, path: &Path, name: &str) -> Result<Option<String>, GitError>;

    /// Add a remote to the repository.
    fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), GitError>;

    /// Remove a remote from the repository.
    fn remove_remote(&self, path: &Path, name: &str) -> Result<(), GitError>;

    /// Branch refs advertised by the remote. Empty for an empty repository.
    fn list_remote(&self, path: &Path, remote: &str, auth: &GitAuth)
    -> Result<Vec<String>, GitError>;

    /// Fetch all branches of a remote into its remote-tracking refs.
    fn fetch(&self, path: &Path, remote: &str, auth: &GitAuth) -> Result<(), GitError>;

    /// Commit id a ref points to, `None` when the ref does not exist.
    fn resolve_ref(&self, path: &Path, refname: &str) -> Result<Option<String>, GitError>;

    /// Whether `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, path: &Path, ancestor: &str, descendant: &str)
    -> Result<bool, GitError>;

    /// Force-checkout `branch`, resetting it to `start_point`.
    fn checkout_branch(&self, path: &Path, branch: &str, start_point: &str)
    -> Result<(), GitError>;

    /// Merge `rev` into the current branch.
    fn merge(&self, path: &Path, rev: &str, fast_forward_only: bool)
    -> Result<MergeOutcome, GitError>;

    /// Abandon an in-progress merge and restore the pre-merge state.
    fn abort_merge(&self, path: &Path) -> Result<(), GitError>;

    /// Paths with unresolved merge conflicts.
    fn unmerged_files(&self, path: &Path) -> Result<Vec<String>, GitError>;

    /// Add files to the staging area.
    fn add_files(&self, path: &Path, files: &[String]) -> Result<(), GitError>;

    /// Whether the index differs from HEAD.
    fn has_staged_changes(&self, path: &Path) -> Result<bool, GitError>;

    /// Get repository status in porcelain format.
    fn status_porcelain(&self, path: &Path) -> Result<String, GitError>;

    /// Create a commit with the given message.
    fn commit(&self, path: &Path, message: &str) -> Result<(), GitError>;

    /// Push HEAD to `branch` on the remote.
    fn push(
        &self,
        path: &Path,
        remote: &str,
        branch: &str,
        auth: &GitAuth,
    ) -> Result<PushOutcome, GitError>;
}

/// Real implementation of GitOps using std::process::Command.
#[derive(Clone, Copy)]
pub struct RealGit;

impl RealGit {
    pub fn new() -> Self {
        Self
    }

    /// Helper to run a git command and return the output.
    fn run_git(
        &self,
        path: &Path,
        args: &[&str],
        auth: Option<&GitAuth>,
    ) -> Result<Output, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(["-c", "commit.gpgsign=false", "-c", "core.quotepath=false"])
            .current_dir(path)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .env("GIT_AUTHOR_NAME", COMMIT_AUTHOR_NAME)
            .env("GIT_AUTHOR_EMAIL", COMMIT_AUTHOR_EMAIL)
            .env("GIT_COMMITTER_NAME", COMMIT_AUTHOR_NAME)
            .env("GIT_COMMITTER_EMAIL", COMMIT_AUTHOR_EMAIL);

        // Must stay alive until the command has exited.
        let _askpass = match auth {
            Some(auth) => apply_auth(&mut cmd, auth)?,
            None => None,
        };

        cmd.args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::GitNotFound
            } else {
                GitError::CommandFailed(e.to_string())
            }
        })
    }

    /// Check if the output indicates success, otherwise return an error.
    fn check_output(&self, output: Output) -> Result<Output, GitError> {
        if output.status.success() {
            Ok(output)
        } else {
            Err(non_zero_exit(&output))
        }
    }

    fn run_checked(&self, path: &Path, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run_git(path, args, None)?;
        self.check_output(output)
    }
}

impl Default for RealGit {
    fn default() -> Self {
        Self::new()
    }
}

fn non_zero_exit(output: &Output) -> GitError {
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let combined = if !stdout.is_empty() && !stderr.is_empty() {
        format!("{}\n{}", stdout, stderr)
    } else if !stdout.is_empty() {
        stdout
    } else {
        stderr
    };
    GitError::NonZeroExit {
        code,
        output: combined,
    }
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// The ssh invocation for key auth. Host keys are checked against the
/// user's known_hosts as usual.
pub(crate) fn ssh_command(key_path: &str) -> String {
    format!("ssh -i {} -o IdentitiesOnly=yes", shell_quote(key_path))
}

/// Configure `cmd` to authenticate with `auth`. Returns the askpass script
/// that has to outlive the command, if one was written.
fn apply_auth(cmd: &mut Command, auth: &GitAuth) -> Result<Option<TempPath>, GitError> {
    match auth {
        GitAuth::Basic { username, password } => {
            // The empty helper clears any helpers from the user's config.
            cmd.args(["-c", "credential.helper=", "-c"])
                .arg(format!("credential.helper={}", CREDENTIAL_HELPER))
                .env("DRAFTSYNC_GIT_USERNAME", username)
                .env("DRAFTSYNC_GIT_PASSWORD", password);
            Ok(None)
        }
        GitAuth::SshKey { path, passphrase } => {
            cmd.env("GIT_SSH_COMMAND", ssh_command(path));
            let Some(passphrase) = passphrase else {
                return Ok(None);
            };
            let script = write_askpass_script()?;
            cmd.env("SSH_ASKPASS", &script)
                .env("SSH_ASKPASS_REQUIRE", "force")
                .env("DISPLAY", ":0")
                .env("DRAFTSYNC_SSH_PASSPHRASE", passphrase);
            Ok(Some(script))
        }
    }
}

fn write_askpass_script() -> Result<TempPath, GitError> {
    use std::io::Write;

    let to_err = |e: std::io::Error| GitError::CommandFailed(format!("askpass script: {}", e));

    let mut file = tempfile::Builder::new()
        .prefix("draftsync-askpass-")
        .suffix(".sh")
        .tempfile()
        .map_err(to_err)?;
    file.write_all(ASKPASS_SCRIPT.as_bytes()).map_err(to_err)?;
    file.flush().map_err(to_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))
            .map_err(to_err)?;
    }

    // Close the handle so the script can be executed.
    Ok(file.into_temp_path())
}

/// Interpret `git push --porcelain` output for `dst`.
fn parse_push_porcelain(stdout: &str, dst: &str) -> Option<Result<PushOutcome, GitError>> {
    for line in stdout.lines() {
        let mut parts = line.splitn(3, '\t');
        let (Some(flag), Some(refs), summary) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if !refs.ends_with(&format!(":{}", dst)) {
            continue;
        }
        let summary = summary.unwrap_or_default().trim();
        return Some(match flag.trim() {
            "=" => Ok(PushOutcome::UpToDate),
            "!" if summary.starts_with("[rejected]") => Err(GitError::NonFastForward),
            "!" => Err(GitError::PushRejected {
                reason: summary.to_string(),
            }),
            _ => Ok(PushOutcome::Pushed),
        });
    }
    None
}

impl GitOps for RealGit {
    fn init(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        self.run_checked(path, &["init", "--quiet"])?;
        let head = format!("refs/heads/{}", branch);
        self.run_checked(path, &["symbolic-ref", "HEAD", &head])?;
        Ok(())
    }

    fn remote_url(&self, path: &Path, name: &str) -> Result<Option<String>, GitError> {
        let key = format!("remote.{}.url", name);
        let output = self.run_git(path, &["config", "--get", &key], None)?;
        match output.status.code() {
            Some(0) => Ok(stdout_lines(&output).into_iter().next()),
            Some(1) => Ok(None),
            _ => Err(non_zero_exit(&output)),
        }
    }

    fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.run_checked(path, &["remote", "add", name, url])?;
        Ok(())
    }

    fn remove_remote(&self, path: &Path, name: &str) -> Result<(), GitError> {
        self.run_checked(path, &["remote", "remove", name])?;
        Ok(())
    }

    fn list_remote(
        &self,
        path: &Path,
        remote: &str,
        auth: &GitAuth,
    ) -> Result<Vec<String>, GitError> {
        let output = self.run_git(path, &["ls-remote", "--heads", remote], Some(auth))?;
        let output = self.check_output(output)?;
        Ok(stdout_lines(&output)
            .into_iter()
            .filter_map(|line| line.split('\t').nth(1).map(str::to_string))
            .collect())
    }

    fn fetch(&self, path: &Path, remote: &str, auth: &GitAuth) -> Result<(), GitError> {
        let output = self.run_git(
            path,
            &["fetch", "--quiet", "--prune", "--no-tags", remote],
            Some(auth),
        )?;
        self.check_output(output)?;
        Ok(())
    }

    fn resolve_ref(&self, path: &Path, refname: &str) -> Result<Option<String>, GitError> {
        let rev = format!("{}^{{commit}}", refname);
        let output = self.run_git(path, &["rev-parse", "--verify", "--quiet", &rev], None)?;
        match output.status.code() {
            Some(0) => Ok(stdout_lines(&output).into_iter().next()),
            Some(1) => Ok(None),
            _ => Err(non_zero_exit(&output)),
        }
    }

    fn is_ancestor(&self, path: &Path, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        let output = self.run_git(
            path,
            &["merge-base", "--is-ancestor", ancestor, descendant],
            None,
        )?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(non_zero_exit(&output)),
        }
    }

    fn checkout_branch(&self, path: &Path, branch: &str, start_point: &str) -> Result<(), GitError> {
        self.run_checked(path, &["checkout", "--quiet", "-f", "-B", branch, start_point])?;
        Ok(())
    }

    fn merge(&self, path: &Path, rev: &str, fast_forward_only: bool) -> Result<MergeOutcome, GitError> {
        if fast_forward_only {
            self.run_checked(path, &["merge", "--quiet", "--ff-only", rev])?;
            return Ok(MergeOutcome::Merged);
        }

        let message = format!("Merge {}", rev);
        let output = self.run_git(
            path,
            &[
                "-c",
                "merge.conflictStyle=merge",
                "merge",
                "--quiet",
                "--no-edit",
                "--allow-unrelated-histories",
                "-m",
                &message,
                rev,
            ],
            None,
        )?;
        if output.status.success() {
            return Ok(MergeOutcome::Merged);
        }

        let conflicted = self.unmerged_files(path)?;
        if conflicted.is_empty() {
            Err(non_zero_exit(&output))
        } else {
            Ok(MergeOutcome::Conflicted(conflicted))
        }
    }

    fn abort_merge(&self, path: &Path) -> Result<(), GitError> {
        self.run_checked(path, &["merge", "--abort"])?;
        Ok(())
    }

    fn unmerged_files(&self, path: &Path) -> Result<Vec<String>, GitError> {
        let output = self.run_checked(path, &["diff", "--name-only", "--diff-filter=U"])?;
        Ok(stdout_lines(&output))
    }

    fn add_files(&self, path: &Path, files: &[String]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        self.run_checked(path, &args)?;
        Ok(())
    }

    fn has_staged_changes(&self, path: &Path) -> Result<bool, GitError> {
        let output = self.run_git(path, &["diff", "--cached", "--quiet"], None)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(non_zero_exit(&output)),
        }
    }

    fn status_porcelain(&self, path: &Path) -> Result<String, GitError> {
        let output = self.run_checked(path, &["status", "--porcelain"])?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn commit(&self, path: &Path, message: &str) -> Result<(), GitError> {
        self.run_checked(path, &["commit", "--quiet", "--no-verify", "-m", message])?;
        Ok(())
    }

    fn push(
        &self,
        path: &Path,
        remote: &str,
        branch: &str,
        auth: &GitAuth,
    ) -> Result<PushOutcome, GitError> {
        let dst = format!("refs/heads/{}", branch);
        let refspec = format!("HEAD:{}", dst);
        let output = self.run_git(path, &["push", "--porcelain", remote, &refspec], Some(auth))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_push_porcelain(&stdout, &dst) {
            Some(result) => result,
            None if output.status.success() => Ok(PushOutcome::Pushed),
            None => Err(non_zero_exit(&output)),
        }
    }
}
