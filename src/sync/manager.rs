//! Replication session management
//!
//! The [`ReplicationManager`] owns the replicator threads of one session. It
//! reads the sync token to decide whether to replicate at all, records the
//! last sync date, tracks which collections have finished their first sync,
//! and fans replication events out to listeners.

use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::replicator::{EventSink, ReplicationEvent, ReplicationTask};
use super::transport::TransportConnector;
use super::{CollectionFlags, FirstSync, SyncGate};
use crate::config::{SettingName, SettingsStore};
use crate::error::{TallyError, TallyResult};
use crate::models::now_timestamp;
use crate::storage::Store;

/// Where the session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Nothing running
    #[default]
    Disconnected,
    /// Connected without a sync token; nothing to replicate
    LocalOnly,
    /// Replicator threads are running against a remote
    Syncing,
}

/// Snapshot of the replication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SessionPhase,
    pub remote: Option<String>,
    /// Which collections can currently reach the remote
    pub alive: CollectionFlags,
    pub first_sync: FirstSync,
    pub last_sync_date: String,
}

struct Shared {
    settings: Arc<dyn SettingsStore>,
    status: RwLock<SyncStatus>,
    listeners: RwLock<Vec<EventSink>>,
}

impl Shared {
    fn update_status(&self, update: impl FnOnce(&mut SyncStatus)) {
        match self.status.write() {
            Ok(mut status) => update(&mut status),
            Err(e) => warn!("Failed to acquire status lock: {}", e),
        }
    }

    fn record_sync_date(&self) {
        let timestamp = now_timestamp();
        if let Err(err) = self
            .settings
            .set_setting(SettingName::LastSyncDate, &timestamp)
        {
            warn!(error = %err, "failed to store last sync date");
        }
        self.update_status(|status| status.last_sync_date = timestamp);
    }

    fn handle(&self, event: &ReplicationEvent) {
        match *event {
            ReplicationEvent::Alive { collection, alive } => {
                self.update_status(|status| status.alive.set(collection, alive));
                if alive {
                    self.record_sync_date();
                }
            }
            ReplicationEvent::Change { ok, .. } => {
                if ok {
                    self.record_sync_date();
                }
            }
            ReplicationEvent::InitialSyncComplete { collection } => {
                info!(collection, "initial sync complete");
                self.update_status(|status| status.first_sync.set(collection, true));
            }
        }

        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(e) => {
                warn!("Failed to acquire listener lock: {}", e);
                return;
            }
        };
        for listener in listeners {
            listener(event);
        }
    }
}

/// Runs replication for a [`Store`] according to the sync token setting
pub struct ReplicationManager {
    shared: Arc<Shared>,
    connector: Arc<dyn TransportConnector>,
    config: SyncConfig,
    tasks: Mutex<Vec<ReplicationTask>>,
}

impl ReplicationManager {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        connector: Arc<dyn TransportConnector>,
        config: SyncConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                status: RwLock::new(SyncStatus::default()),
                listeners: RwLock::new(Vec::new()),
            }),
            connector,
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start a session for `store`.
    ///
    /// Any running session is stopped first, and the first-sync flags start
    /// over. Without a sync token the session is local-only and counts as
    /// fully synced.
    pub fn start(&self, store: &Store) -> TallyResult<()> {
        self.stop();

        let token = self.shared.settings.get_setting(SettingName::SyncToken)?;
        let last_sync_date = self
            .shared
            .settings
            .get_setting(SettingName::LastSyncDate)?;

        if token.trim().is_empty() {
            self.shared.update_status(|status| {
                *status = SyncStatus {
                    phase: SessionPhase::LocalOnly,
                    first_sync: FirstSync::done(),
                    last_sync_date,
                    ..SyncStatus::default()
                };
            });
            debug!("no sync token, running local-only");
            return Ok(());
        }

        let remote = self.connector.connect(&token)?;
        self.shared.update_status(|status| {
            *status = SyncStatus {
                phase: SessionPhase::Syncing,
                remote: Some(token.clone()),
                last_sync_date,
                ..SyncStatus::default()
            };
        });

        let shared = self.shared.clone();
        let sink: EventSink = Arc::new(move |event: &ReplicationEvent| shared.handle(event));

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| TallyError::Replication(format!("Failed to acquire task lock: {}", e)))?;
        let spawn_error =
            |e: std::io::Error| TallyError::Replication(format!("Failed to start replicator: {}", e));
        tasks.push(
            ReplicationTask::spawn(
                store.budgets.clone(),
                remote.clone(),
                self.config.clone(),
                sink.clone(),
            )
            .map_err(spawn_error)?,
        );
        tasks.push(
            ReplicationTask::spawn(store.expenses.clone(), remote, self.config.clone(), sink)
                .map_err(spawn_error)?,
        );

        info!(remote = %token, "replication started");
        Ok(())
    }

    /// Stop replication and drop every listener
    pub fn stop(&self) {
        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(e) => {
                warn!("Failed to acquire task lock: {}", e);
                Vec::new()
            }
        };
        let was_running = !tasks.is_empty();
        for task in tasks {
            task.stop();
        }

        match self.shared.listeners.write() {
            Ok(mut listeners) => listeners.clear(),
            Err(e) => warn!("Failed to acquire listener lock: {}", e),
        }
        self.shared.update_status(|status| {
            status.phase = SessionPhase::Disconnected;
            status.alive = CollectionFlags::default();
        });

        if was_running {
            info!("replication stopped");
        }
    }

    /// Receive every replication event until the session stops
    pub fn subscribe(&self, listener: EventSink) {
        match self.shared.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(e) => warn!("Failed to acquire listener lock: {}", e),
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.shared
            .status
            .read()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    pub fn first_sync(&self) -> FirstSync {
        self.status().first_sync
    }

    /// Block until both collections finished their first sync.
    ///
    /// Returns false if that didn't happen within `timeout`.
    pub fn wait_for_first_sync(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.first_sync_done() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl SyncGate for ReplicationManager {
    fn first_sync_done(&self) -> bool {
        self.first_sync().first_sync_done()
    }
}

impl Drop for ReplicationManager {
    fn drop(&mut self) {
        self.stop();
    }
}
