//! Sync configuration types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Longest accepted auto-sync period, one week in minutes.
pub const MAX_BACKUP_INTERVAL: u64 = 7 * 24 * 60;

/// How the engine authenticates against the remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    /// Personal access token, sent as basic auth with a fixed username.
    #[default]
    #[serde(rename = "token")]
    Token,
    #[serde(rename = "user_pass", alias = "userpass")]
    UserPass,
    #[serde(rename = "ssh_key", alias = "sshkey")]
    SshKey,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMethod::Token => "token",
            AuthMethod::UserPass => "user_pass",
            AuthMethod::SshKey => "ssh_key",
        };
        f.write_str(name)
    }
}

/// Settings consumed by the sync engine.
///
/// Every field has a default so partial YAML files are accepted; the
/// default configuration has sync disabled.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub repo_url: String,
    pub auth_method: AuthMethod,
    pub username: String,
    pub password: String,
    pub token: String,
    pub ssh_key_path: String,
    pub ssh_key_passphrase: String,
    pub auto_backup: bool,
    /// Auto-sync period in minutes.
    pub backup_interval: u64,
}

impl SyncConfig {
    /// Whether the engine should do anything at all.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.repo_url.trim().is_empty()
    }

    /// Auto-sync period, if auto-sync is switched on with a usable interval.
    ///
    /// Intervals above [`MAX_BACKUP_INTERVAL`] are clamped to it.
    pub fn auto_sync_interval(&self) -> Option<Duration> {
        if !(self.enabled && self.auto_backup && self.backup_interval > 0) {
            return None;
        }
        let minutes = self.backup_interval.min(MAX_BACKUP_INTERVAL);
        Some(Duration::from_secs(minutes * 60))
    }

    /// Check the settings an enabled engine depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.repo_url.trim().is_empty() {
            return Err(invalid(
                "repo_url",
                "repository URL is required when sync is enabled",
            ));
        }
        if self.auto_backup && self.backup_interval == 0 {
            return Err(invalid(
                "backup_interval",
                "must be at least 1 minute when auto_backup is on",
            ));
        }
        if self.backup_interval > MAX_BACKUP_INTERVAL {
            return Err(invalid(
                "backup_interval",
                format!("must not exceed {} minutes", MAX_BACKUP_INTERVAL),
            ));
        }

        match self.auth_method {
            AuthMethod::Token if self.token.trim().is_empty() => {
                Err(invalid("token", "required for token authentication"))
            }
            AuthMethod::UserPass if self.username.trim().is_empty() => {
                Err(invalid("username", "required for user_pass authentication"))
            }
            AuthMethod::UserPass if self.password.is_empty() => {
                Err(invalid("password", "required for user_pass authentication"))
            }
            AuthMethod::SshKey if self.ssh_key_path.trim().is_empty() => {
                Err(invalid("ssh_key_path", "required for ssh_key authentication"))
            }
            _ => Ok(()),
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "***" }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("enabled", &self.enabled)
            .field("repo_url", &self.repo_url)
            .field("auth_method", &self.auth_method)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("token", &redact(&self.token))
            .field("ssh_key_path", &self.ssh_key_path)
            .field("ssh_key_passphrase", &redact(&self.ssh_key_passphrase))
            .field("auto_backup", &self.auto_backup)
            .field("backup_interval", &self.backup_interval)
            .finish()
    }
}
