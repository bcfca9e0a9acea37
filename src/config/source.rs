//! Configuration sources.
//!
//! A [`ConfigSource`] hands out the current [`SyncConfig`] and a watch
//! channel that fires whenever it changes.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, info};

use super::{ConfigError, SyncConfig};

/// Supplies the sync configuration and notifies about changes.
pub trait ConfigSource: Send + Sync + 'static {
    /// Current configuration.
    fn load(&self) -> Result<SyncConfig, ConfigError>;

    /// Change-notification hook. The receiver sees every published value.
    fn subscribe(&self) -> watch::Receiver<SyncConfig>;
}

/// Publish `config` if it differs from the current value.
fn publish(tx: &watch::Sender<SyncConfig>, config: SyncConfig) -> bool {
    tx.send_if_modified(|current| {
        if *current == config {
            false
        } else {
            *current = config;
            true
        }
    })
}

// =============================================================================
// In-memory source
// =============================================================================

/// Configuration held in memory; `set` publishes changes.
pub struct MemoryConfig {
    tx: watch::Sender<SyncConfig>,
}

impl MemoryConfig {
    pub fn new(config: SyncConfig) -> Self {
        let (tx, _rx) = watch::channel(config);
        Self { tx }
    }

    /// Replace the configuration. Returns whether it changed.
    pub fn set(&self, config: SyncConfig) -> bool {
        publish(&self.tx, config)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl ConfigSource for MemoryConfig {
    fn load(&self) -> Result<SyncConfig, ConfigError> {
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<SyncConfig> {
        self.tx.subscribe()
    }
}

// =============================================================================
// YAML file source
// =============================================================================

/// Configuration read from a YAML file.
///
/// A missing file is the default (disabled) configuration. Every read is
/// validated; an invalid file is rejected and the previous value is kept.
pub struct YamlConfigFile {
    path: PathBuf,
    tx: watch::Sender<SyncConfig>,
}

impl YamlConfigFile {
    /// Read the file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = read_yaml(&path)?;
        let (tx, _rx) = watch::channel(config);
        Ok(Self { path, tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, notifying subscribers when the value changed.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let config = read_yaml(&self.path)?;
        let changed = publish(&self.tx, config);
        if changed {
            info!(path = %self.path.display(), "Configuration changed");
        }
        Ok(changed)
    }
}

impl ConfigSource for YamlConfigFile {
    fn load(&self) -> Result<SyncConfig, ConfigError> {
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<SyncConfig> {
        self.tx.subscribe()
    }
}

fn read_yaml(path: &Path) -> Result<SyncConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, sync disabled");
            return Ok(SyncConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if text.trim().is_empty() {
        return Ok(SyncConfig::default());
    }

    let config: SyncConfig = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}
