mod commands;
pub mod error;
pub mod utils;

#[cfg(test)]
#[path = "utils_test.rs"]
mod utils_test;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::YamlConfigFile;
use crate::db::{Database, SqliteDatabase};
use crate::sync::{RealGit, SyncManager, get_backup_dir, get_config_path, get_data_dir, get_db_path};
use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "draftsync")]
#[command(author, version, about = "Sync the draftsync store through a git repository", long_about = None)]
pub struct Cli {
    /// Data directory (default: $XDG_DATA_HOME/draftsync or ~/.local/share/draftsync)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Configuration file (default: <home>/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or open the repository and check the remote
    Init,
    /// Run one sync cycle
    Sync {
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show sync status
    Status {
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Keep syncing on the configured interval until Ctrl-C
    Watch {
        /// Seconds between configuration file checks
        #[arg(long, default_value_t = 5)]
        poll: u64,
    },
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise the level follows `-v`.
pub fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "draftsync=info",
        1 => "draftsync=debug",
        _ => "draftsync=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let home = cli.home.as_deref();
    let data_dir = get_data_dir(home);
    std::fs::create_dir_all(&data_dir).map_err(|e| CliError::DataDir {
        path: data_dir.display().to_string(),
        source: e,
    })?;

    let config_path = cli.config.clone().unwrap_or_else(|| get_config_path(home));
    let config = Arc::new(YamlConfigFile::open(&config_path)?);

    let db = SqliteDatabase::open(get_db_path(home)).await?;
    db.migrate().await?;

    let manager =
        SyncManager::with_sync_dir(db, RealGit::new(), config.clone(), get_backup_dir(home));

    match cli.command {
        Commands::Init => println!("{}", commands::sync::init(&manager).await?),
        Commands::Sync { format } => {
            println!("{}", commands::sync::sync(&manager, &format).await?)
        }
        Commands::Status { format } => {
            println!("{}", commands::sync::status(&manager, &format).await?)
        }
        Commands::Watch { poll } => {
            commands::sync::watch(manager, config, Duration::from_secs(poll.max(1))).await?
        }
    }
    Ok(())
}
