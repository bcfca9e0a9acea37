//! Sync service - lifecycle around the [`SyncManager`].
//!
//! Ties the manager to the auto-sync schedule and reacts to configuration
//! changes published by the [`ConfigSource`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigSource, SyncConfig};
use crate::db::Database;

use super::git::GitOps;
use super::manager::{SyncError, SyncManager, SyncReport, SyncStatus};
use super::scheduler::AutoSync;

struct Observer {
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the manager, the auto-sync schedule and the config observer.
pub struct SyncService<D: Database, G: GitOps, C: ConfigSource> {
    manager: Arc<SyncManager<D, G, C>>,
    auto_sync: AutoSync,
    observer: Mutex<Option<Observer>>,
}

impl<D, G, C> SyncService<D, G, C>
where
    D: Database,
    G: GitOps + 'static,
    C: ConfigSource,
{
    pub fn new(manager: SyncManager<D, G, C>) -> Arc<Self> {
        Arc::new(Self {
            manager: Arc::new(manager),
            auto_sync: AutoSync::new(),
            observer: Mutex::new(None),
        })
    }

    pub fn manager(&self) -> &Arc<SyncManager<D, G, C>> {
        &self.manager
    }

    pub fn auto_sync(&self) -> &AutoSync {
        &self.auto_sync
    }

    /// Initialize, start auto-sync when configured and begin watching the
    /// configuration. Initialization errors are logged, not returned.
    #[instrument(skip(self))]
    pub async fn startup(self: &Arc<Self>) {
        let config = match self.manager.config().load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to load sync configuration");
                SyncConfig::default()
            }
        };

        self.activate(&config).await;
        self.watch_config().await;
        info!("Sync service started");
    }

    /// React to a new configuration.
    ///
    /// Disabling stops auto-sync and clears readiness. An invalid
    /// configuration does the same and is otherwise ignored. Any other
    /// change re-initializes and restarts auto-sync with the new interval.
    #[instrument(skip(self, config), fields(enabled = config.enabled))]
    pub async fn handle_config_change(&self, config: SyncConfig) {
        self.auto_sync.stop().await;
        self.manager.reset();

        if !config.enabled {
            info!("Sync disabled");
            return;
        }
        self.activate(&config).await;
    }

    async fn activate(&self, config: &SyncConfig) {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Ignoring invalid sync configuration");
            return;
        }

        match self.manager.initialize().await {
            Ok(true) => {}
            Ok(false) => debug!("Sync inactive"),
            Err(e) => warn!(error = %e, "Sync initialization failed"),
        }

        if let Some(period) = config.auto_sync_interval() {
            let manager = self.manager.clone();
            self.auto_sync
                .start(period, move || {
                    let manager = manager.clone();
                    async move { manager.sync().await.map(|_| ()) }
                })
                .await;
        }
    }

    async fn watch_config(self: &Arc<Self>) {
        let mut observer = self.observer.lock().await;
        if observer.is_some() {
            return;
        }

        let mut changes = self.manager.config().subscribe();
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let service = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            debug!("Configuration source closed");
                            break;
                        }
                        let config = changes.borrow_and_update().clone();
                        let Some(service) = service.upgrade() else {
                            break;
                        };
                        service.handle_config_change(config).await;
                    }
                }
            }
        });

        *observer = Some(Observer {
            cancellation_token,
            handle,
        });
    }

    /// Run a sync cycle now, surfacing its error.
    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        self.manager.sync().await
    }

    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        self.manager.status().await
    }

    /// Stop watching the configuration and stop auto-sync, waiting for a
    /// scheduled run in progress.
    pub async fn shutdown(&self) {
        if let Some(observer) = self.observer.lock().await.take() {
            observer.cancellation_token.cancel();
            if let Err(e) = observer.handle.await {
                warn!(error = %e, "Config observer ended abnormally");
            }
        }
        self.auto_sync.stop().await;
        info!("Sync service stopped");
    }
}
