//! Path resolution for draftsync directories.
//!
//! Provides XDG-compliant path resolution. Every function takes an optional
//! home override (the CLI's `--home`) that replaces the data root.

use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "draftsync";

/// Get the data root.
///
/// `home` wins when given; otherwise `$XDG_DATA_HOME/draftsync`, falling
/// back to `~/.local/share/draftsync`.
pub fn get_data_dir(home: Option<&Path>) -> PathBuf {
    if let Some(home) = home {
        return home.to_path_buf();
    }

    let data_home = env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local/share")
        });

    data_home.join(APP_DIR)
}

/// Get the git working tree (data_dir/backup).
pub fn get_backup_dir(home: Option<&Path>) -> PathBuf {
    get_data_dir(home).join("backup")
}

/// Get the SQLite store path (data_dir/draftsync.db).
pub fn get_db_path(home: Option<&Path>) -> PathBuf {
    get_data_dir(home).join("draftsync.db")
}

/// Get the configuration file path (data_dir/config.yaml).
pub fn get_config_path(home: Option<&Path>) -> PathBuf {
    get_data_dir(home).join("config.yaml")
}
