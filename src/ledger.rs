//! The Tally ledger
//!
//! `Ledger` ties the local store, the replication session, and settings
//! together for a host (the CLI, or any embedding UI). It opens the store
//! lazily, refuses overlapping calls of the same operation, and reconnects
//! after operations that wipe data or change the sync token.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{FileSettings, SettingName, SettingsStore, TallyPaths};
use crate::error::{TallyError, TallyResult};
use crate::models::{Budget, BudgetDraft, Expense, ExpenseDraft, Month, SaveRequest};
use crate::reports::MonthSummary;
use crate::services::transfer::RemoteAccess;
use crate::services::{
    BudgetService, ExpenseService, ExportFile, ImportConfig, ImportFile, ImportMode, ImportReport,
    MonthService, TransferService,
};
use crate::storage::Store;
use crate::sync::{
    DirectoryConnector, ReplicationManager, SessionPhase, SyncConfig, SyncGate, SyncStatus,
    TransportConnector,
};

/// How long a month load waits for the first sync before rolling forward
pub const DEFAULT_FIRST_SYNC_WAIT: Duration = Duration::from_secs(10);

/// A loaded month, as shown to the user
#[derive(Debug, Clone)]
pub struct MonthView {
    pub month: Month,
    /// Sorted by name
    pub budgets: Vec<Budget>,
    /// Newest first
    pub expenses: Vec<Expense>,
    pub last_sync_date: String,
}

impl MonthView {
    pub fn summary(&self) -> MonthSummary {
        MonthSummary::compute(self.month, &self.budgets, &self.expenses)
    }

    /// Expenses passing `filter`, in view order
    pub fn filtered_expenses(&self, filter: &ExpenseFilter) -> Vec<Expense> {
        self.expenses
            .iter()
            .filter(|expense| filter.matches(expense))
            .cloned()
            .collect()
    }
}

/// Narrows an expense list by description text and budget names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    /// Case-insensitive substring of the description
    pub description: Option<String>,
    /// Budget names to keep; empty keeps all
    pub budgets: BTreeSet<String>,
}

impl ExpenseFilter {
    pub fn is_empty(&self) -> bool {
        self.description.as_deref().map_or(true, str::is_empty) && self.budgets.is_empty()
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        let description_ok = match self.description.as_deref() {
            Some(text) if !text.is_empty() => expense
                .description
                .to_lowercase()
                .contains(&text.to_lowercase()),
            _ => true,
        };
        description_ok && (self.budgets.is_empty() || self.budgets.contains(&expense.budget))
    }
}

/// Outcome of a guarded operation
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<T> {
    Completed(T),
    /// The same operation was already running; nothing was done
    Ignored,
}

impl<T> Dispatch<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Ignored => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// In-flight flag for one operation site
#[derive(Default)]
struct InFlight(AtomicBool);

struct InFlightToken<'a>(&'a AtomicBool);

impl InFlight {
    fn begin(&self) -> Option<InFlightToken<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightToken(&self.0))
    }
}

impl Drop for InFlightToken<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Guards {
    save_budget: InFlight,
    delete_budget: InFlight,
    save_expense: InFlight,
    delete_expense: InFlight,
    export: InFlight,
    import: InFlight,
    delete_all: InFlight,
    save_setting: InFlight,
}

/// An open store with its replication session
struct Session {
    store: Store,
    replication: ReplicationManager,
}

/// Entry point for hosts
pub struct Ledger {
    data_dir: PathBuf,
    settings: Arc<dyn SettingsStore>,
    connector: Arc<dyn TransportConnector>,
    sync_config: SyncConfig,
    import_config: ImportConfig,
    first_sync_wait: Duration,
    session: RwLock<Option<Arc<Session>>>,
    guards: Guards,
}

impl Ledger {
    /// A ledger over the data and settings under `paths`, syncing through
    /// directory remotes
    pub fn open(paths: &TallyPaths) -> TallyResult<Self> {
        paths.ensure_directories()?;
        let settings = FileSettings::open(paths.clone())?;
        Ok(Self::new(
            paths.data_dir(),
            Arc::new(settings),
            Arc::new(DirectoryConnector::new()),
        ))
    }

    /// A ledger with explicit collaborators. Nothing is opened until the
    /// first operation.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        settings: Arc<dyn SettingsStore>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            settings,
            connector,
            sync_config: SyncConfig::default(),
            import_config: ImportConfig::default(),
            first_sync_wait: DEFAULT_FIRST_SYNC_WAIT,
            session: RwLock::new(None),
            guards: Guards::default(),
        }
    }

    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = config;
        self
    }

    pub fn with_import_config(mut self, config: ImportConfig) -> Self {
        self.import_config = config;
        self
    }

    /// Bound on how long `load_month` waits for the first sync
    pub fn with_first_sync_wait(mut self, wait: Duration) -> Self {
        self.first_sync_wait = wait;
        self
    }

    fn connect(&self) -> TallyResult<Session> {
        let store = Store::open(&self.data_dir)?;
        let replication = ReplicationManager::new(
            self.settings.clone(),
            self.connector.clone(),
            self.sync_config.clone(),
        );
        replication.start(&store)?;
        Ok(Session { store, replication })
    }

    /// The open session, opening one if needed.
    ///
    /// Connect failures are logged and reported as `NotConnected`; the next
    /// call tries again.
    fn ensure_connection(&self) -> TallyResult<Arc<Session>> {
        let mut slot = self
            .session
            .write()
            .map_err(|e| TallyError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        match self.connect() {
            Ok(session) => {
                let session = Arc::new(session);
                *slot = Some(session.clone());
                debug!(dir = %self.data_dir.display(), "connected");
                Ok(session)
            }
            Err(err) => {
                error!(error = %err, "failed to connect to the local database");
                Err(TallyError::NotConnected)
            }
        }
    }

    /// Whether a session is open right now
    pub fn is_connected(&self) -> bool {
        self.session.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Stop replication and close the store. Safe to call when closed.
    pub fn disconnect(&self) {
        let session = match self.session.write() {
            Ok(mut slot) => slot.take(),
            Err(e) => {
                warn!("Failed to acquire write lock: {}", e);
                None
            }
        };
        if let Some(session) = session {
            session.replication.stop();
            debug!("disconnected");
        }
    }

    /// Close the session and open a fresh one; returns whether that worked
    pub fn reconnect(&self) -> bool {
        self.disconnect();
        self.ensure_connection().is_ok()
    }

    pub fn sync_status(&self) -> TallyResult<SyncStatus> {
        Ok(self.ensure_connection()?.replication.status())
    }

    /// Block until both collections finished their first sync
    pub fn wait_for_first_sync(&self, timeout: Duration) -> TallyResult<bool> {
        Ok(self
            .ensure_connection()?
            .replication
            .wait_for_first_sync(timeout))
    }

    fn dispatch<T>(
        &self,
        site: &InFlight,
        operation: &'static str,
        run: impl FnOnce() -> TallyResult<T>,
    ) -> TallyResult<Dispatch<T>> {
        let Some(_token) = site.begin() else {
            debug!(operation, "already in progress, ignoring");
            return Ok(Dispatch::Ignored);
        };
        run().map(Dispatch::Completed)
    }

    /// Load a month, rolling budgets forward into it when it's empty.
    ///
    /// While syncing, a month that can roll forward first waits (bounded by
    /// `first_sync_wait`) for the first sync, since the copy is gated on it.
    pub fn load_month(&self, month: Month) -> TallyResult<MonthView> {
        let session = self.ensure_connection()?;
        let replication = &session.replication;
        if replication.status().phase == SessionPhase::Syncing
            && MonthService::rollover_source(month, Month::current()).is_some()
            && !replication.first_sync_done()
            && !replication.wait_for_first_sync(self.first_sync_wait)
        {
            warn!(%month, "first sync still pending, budgets were not rolled forward");
        }
        let documents = MonthService::new(&session.store, &session.replication).load(month)?;
        Ok(MonthView {
            month,
            budgets: documents.budgets,
            expenses: documents.expenses,
            last_sync_date: self.settings.get_setting(SettingName::LastSyncDate)?,
        })
    }

    /// Navigate to a month given as `YYYY-MM`; at most next month
    pub fn change_month(&self, month: &str) -> TallyResult<MonthView> {
        let month: Month = month.parse()?;
        if month > Month::current().next() {
            return Err(TallyError::Validation(
                "Cannot travel further into the future!".into(),
            ));
        }
        self.load_month(month)
    }

    pub fn fetch_budgets(&self, month: Month) -> TallyResult<Vec<Budget>> {
        let session = self.ensure_connection()?;
        BudgetService::new(&session.store).fetch_for_month(&month.to_string())
    }

    pub fn fetch_expenses(&self, month: Month) -> TallyResult<Vec<Expense>> {
        let session = self.ensure_connection()?;
        ExpenseService::new(&session.store).fetch_for_month(&month)
    }

    pub fn get_budget(&self, id: &str) -> TallyResult<Budget> {
        let session = self.ensure_connection()?;
        BudgetService::new(&session.store).get(id)
    }

    pub fn get_expense(&self, id: &str) -> TallyResult<Expense> {
        let session = self.ensure_connection()?;
        ExpenseService::new(&session.store).get(id)
    }

    pub fn save_budget(&self, request: SaveRequest<BudgetDraft>) -> TallyResult<Dispatch<Budget>> {
        self.dispatch(&self.guards.save_budget, "save budget", || {
            let session = self.ensure_connection()?;
            BudgetService::new(&session.store).save(request)
        })
    }

    pub fn delete_budget(&self, id: &str) -> TallyResult<Dispatch<()>> {
        self.dispatch(&self.guards.delete_budget, "delete budget", || {
            let session = self.ensure_connection()?;
            BudgetService::new(&session.store).delete(id)
        })
    }

    pub fn save_expense(
        &self,
        request: SaveRequest<ExpenseDraft>,
    ) -> TallyResult<Dispatch<Expense>> {
        self.dispatch(&self.guards.save_expense, "save expense", || {
            let session = self.ensure_connection()?;
            ExpenseService::new(&session.store).save(request)
        })
    }

    pub fn delete_expense(&self, id: &str) -> TallyResult<Dispatch<()>> {
        self.dispatch(&self.guards.delete_expense, "delete expense", || {
            let session = self.ensure_connection()?;
            ExpenseService::new(&session.store).delete(id)
        })
    }

    pub fn export(&self) -> TallyResult<Dispatch<ExportFile>> {
        self.dispatch(&self.guards.export, "export", || {
            let session = self.ensure_connection()?;
            TransferService::new(&session.store).export()
        })
    }

    fn transfer<'a>(&'a self, store: &'a Store) -> TransferService<'a> {
        TransferService::new(store)
            .with_config(self.import_config.clone())
            .with_remote(RemoteAccess {
                settings: self.settings.as_ref(),
                connector: self.connector.as_ref(),
            })
    }

    /// Import parsed file contents.
    ///
    /// Replacing stops replication before wiping. After a replace, or after
    /// any failed import, the session is reopened.
    pub fn import(&self, mode: ImportMode, file: ImportFile) -> TallyResult<Dispatch<ImportReport>> {
        self.dispatch(&self.guards.import, "import", || {
            let session = self.ensure_connection()?;
            if mode == ImportMode::Replace {
                session.replication.stop();
            } else if !session.replication.first_sync_done() {
                warn!("importing before the first sync finished; the remote may add duplicates");
            }

            let result = self.transfer(&session.store).import(
                mode,
                file.budgets.unwrap_or_default(),
                file.expenses.unwrap_or_default(),
            );
            drop(session);

            if mode == ImportMode::Replace || result.is_err() {
                self.reconnect();
            }
            result
        })
    }

    /// Erase all local data, and the remote's when syncing
    pub fn delete_all_data(&self) -> TallyResult<Dispatch<()>> {
        self.dispatch(&self.guards.delete_all, "delete all data", || {
            let session = self.ensure_connection()?;
            session.replication.stop();
            let result = self.transfer(&session.store).delete_all_data();
            drop(session);

            self.reconnect();
            if result.is_ok() {
                info!("all data deleted");
            }
            result
        })
    }

    pub fn get_setting(&self, name: SettingName) -> TallyResult<String> {
        self.settings.get_setting(name)
    }

    /// Store a setting and reconnect so a new sync token takes effect
    pub fn save_setting(&self, name: SettingName, value: &str) -> TallyResult<Dispatch<()>> {
        self.dispatch(&self.guards.save_setting, "save setting", || {
            self.settings.set_setting(name, value)?;
            self.reconnect();
            Ok(())
        })
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        self.disconnect();
    }
}
