//! Bulk import and export
//!
//! Export writes every budget and expense with revisions stripped, in a
//! fixed order. Import bulk-inserts documents in rate-limited batches and
//! does not validate them: an import file is trusted to hold documents that
//! were valid when they were exported.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{sort_by_date, sort_by_name};
use crate::config::{SettingName, SettingsStore};
use crate::error::{TallyError, TallyResult};
use crate::models::{mint_id, Budget, Expense};
use crate::storage::{Collection, Document, Query, Store};
use crate::sync::TransportConnector;

/// Documents per bulk insert
pub const IMPORT_CHUNK_SIZE: usize = 200;

/// Pause between two bulk inserts, so a remote replica isn't flooded
pub const IMPORT_CHUNK_PAUSE: Duration = Duration::from_secs(1);

const PARSE_ERROR: &str = "Could not parse the file. Please confirm what you chose is correct.";

// Bounds of the full export scan
const FIRST_MONTH: &str = "2000-01";
const LAST_MONTH: &str = "2100-12";
const FIRST_DATE: &str = "2000-01-01";
const LAST_DATE: &str = "2100-12-31";

/// Batching of bulk imports
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub chunk_size: usize,
    pub chunk_pause: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: IMPORT_CHUNK_SIZE,
            chunk_pause: IMPORT_CHUNK_PAUSE,
        }
    }
}

/// Whether an import keeps existing data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Add to what's there; documents with a taken id are skipped
    Merge,
    /// Delete all data first
    Replace,
}

/// What an import did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub budgets_imported: usize,
    pub expenses_imported: usize,
    /// Size of each budget batch, in write order
    pub budget_batches: Vec<usize>,
    pub expense_batches: Vec<usize>,
    /// Ids skipped because a document with that id already exists
    pub conflicts: Vec<String>,
}

/// Contents of an export file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportFile {
    pub budgets: Vec<Budget>,
    pub expenses: Vec<Expense>,
}

impl ExportFile {
    pub fn to_json(&self) -> TallyResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TallyError::Export(format!("Failed to serialize data: {}", e)))
    }
}

/// Contents of an import file; either list may be missing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportFile {
    #[serde(default)]
    pub budgets: Option<Vec<Budget>>,
    #[serde(default)]
    pub expenses: Option<Vec<Expense>>,
}

/// Parse the text of an import file.
///
/// Fails when the text isn't JSON or has neither a `budgets` nor an
/// `expenses` list.
pub fn parse_import_file(text: &str) -> TallyResult<ImportFile> {
    let file: ImportFile = serde_json::from_str(text).map_err(|e| {
        debug!(error = %e, "import file is not valid JSON");
        TallyError::Import(PARSE_ERROR.into())
    })?;

    if file.budgets.is_none() && file.expenses.is_none() {
        return Err(TallyError::Import(PARSE_ERROR.into()));
    }
    Ok(file)
}

/// Where the remote replica lives, for erasing it along with local data
pub struct RemoteAccess<'a> {
    pub settings: &'a dyn SettingsStore,
    pub connector: &'a dyn TransportConnector,
}

/// Service for moving all data in and out at once
pub struct TransferService<'a> {
    store: &'a Store,
    remote: Option<RemoteAccess<'a>>,
    config: ImportConfig,
}

impl<'a> TransferService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            remote: None,
            config: ImportConfig::default(),
        }
    }

    /// Also erase the remote replica when deleting all data
    pub fn with_remote(mut self, remote: RemoteAccess<'a>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_config(mut self, config: ImportConfig) -> Self {
        self.config = config;
        self
    }

    /// Every budget and expense, revisions stripped.
    ///
    /// Budgets are sorted by name, expenses by date (oldest first), so the
    /// same data always exports the same way.
    pub fn export(&self) -> TallyResult<ExportFile> {
        let mut budgets: Vec<Budget> = self
            .store
            .budgets
            .find(&Query::all().between("month", FIRST_MONTH, LAST_MONTH))?
            .iter()
            .map(Budget::without_revision)
            .collect();
        let mut expenses: Vec<Expense> = self
            .store
            .expenses
            .find(&Query::all().between("date", FIRST_DATE, LAST_DATE))?
            .iter()
            .map(Expense::without_revision)
            .collect();

        sort_by_name(&mut budgets);
        sort_by_date(&mut expenses);

        info!(
            budgets = budgets.len(),
            expenses = expenses.len(),
            "exported data"
        );
        Ok(ExportFile { budgets, expenses })
    }

    /// Bulk-insert budgets and expenses
    pub fn import(
        &self,
        mode: ImportMode,
        budgets: Vec<Budget>,
        expenses: Vec<Expense>,
    ) -> TallyResult<ImportReport> {
        if mode == ImportMode::Replace {
            self.delete_all_data()?;
            self.store.recreate_collections()?;
        }

        let mut report = ImportReport::default();
        report.budgets_imported = self.write_in_batches(
            &self.store.budgets,
            budgets,
            &mut report.budget_batches,
            &mut report.conflicts,
        )?;
        report.expenses_imported = self.write_in_batches(
            &self.store.expenses,
            expenses,
            &mut report.expense_batches,
            &mut report.conflicts,
        )?;

        info!(
            ?mode,
            budgets = report.budgets_imported,
            expenses = report.expenses_imported,
            conflicts = report.conflicts.len(),
            "import finished"
        );
        Ok(report)
    }

    fn write_in_batches<D: Document>(
        &self,
        collection: &Collection<D>,
        docs: Vec<D>,
        batches: &mut Vec<usize>,
        conflicts: &mut Vec<String>,
    ) -> TallyResult<usize> {
        let docs: Vec<D> = docs
            .into_iter()
            .map(|mut doc| {
                if doc.id().is_empty() {
                    doc.set_id(mint_id());
                }
                doc.set_revision(None);
                doc
            })
            .collect();

        let chunk_size = self.config.chunk_size.max(1);
        let mut imported = 0;
        for (index, chunk) in docs.chunks(chunk_size).enumerate() {
            if index > 0 {
                thread::sleep(self.config.chunk_pause);
            }
            let result = collection.bulk_insert(chunk.to_vec())?;
            debug!(
                collection = D::COLLECTION,
                batch = index + 1,
                size = chunk.len(),
                inserted = result.inserted,
                "imported batch"
            );
            batches.push(chunk.len());
            imported += result.inserted;
            conflicts.extend(result.conflicts);
        }
        Ok(imported)
    }

    /// Remove both collections and erase the local database.
    ///
    /// When a sync token is configured, the remote replica is erased too.
    /// Collections stay unusable until [`Store::recreate_collections`].
    pub fn delete_all_data(&self) -> TallyResult<()> {
        self.store.erase()?;

        if let Some(remote) = &self.remote {
            let token = remote.settings.get_setting(SettingName::SyncToken)?;
            if !token.trim().is_empty() {
                remote.connector.connect(&token)?.erase()?;
                info!(remote = %token, "remote data erased");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettings;
    use crate::models::{BudgetDraft, ExpenseDraft, SaveRequest};
    use crate::services::{BudgetService, ExpenseService};
    use crate::sync::DirectoryConnector;
    use std::time::Instant;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("db")).unwrap();
        (temp_dir, store)
    }

    fn quick() -> ImportConfig {
        ImportConfig {
            chunk_size: IMPORT_CHUNK_SIZE,
            chunk_pause: Duration::ZERO,
        }
    }

    fn seed(store: &Store) {
        let budgets = BudgetService::new(store);
        budgets
            .save(SaveRequest::Create(BudgetDraft::new("rent", "2025-01", 900.0)))
            .unwrap();
        budgets
            .save(SaveRequest::Create(BudgetDraft::new("Food", "2025-01", 300.0)))
            .unwrap();
        let expenses = ExpenseService::new(store);
        expenses
            .save(SaveRequest::Create(ExpenseDraft::new(
                20.0, "Lunch", "Food", "2025-01-20",
            )))
            .unwrap();
        expenses
            .save(SaveRequest::Create(ExpenseDraft::new(
                900.0, "Rent", "rent", "2025-01-01",
            )))
            .unwrap();
    }

    type BudgetTuple = (String, String, u64);
    type ExpenseTuple = (u64, String, String, String);

    fn tuples(file: &ExportFile) -> (Vec<BudgetTuple>, Vec<ExpenseTuple>) {
        (
            file.budgets
                .iter()
                .map(|b| (b.name.clone(), b.month.clone(), b.value.to_bits()))
                .collect(),
            file.expenses
                .iter()
                .map(|e| {
                    (
                        e.cost.to_bits(),
                        e.description.clone(),
                        e.budget.clone(),
                        e.date.clone(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_export_is_sorted_and_stripped() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);

        let export = TransferService::new(&store).export().unwrap();

        let names: Vec<_> = export.budgets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Food", "rent"]);
        let dates: Vec<_> = export.expenses.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-01-01", "2025-01-20"]);
        assert!(export.budgets.iter().all(|b| b.revision.is_none()));
        assert!(!export.to_json().unwrap().contains("_rev"));
    }

    #[test]
    fn test_export_replace_import_round_trip() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);
        let service = TransferService::new(&store).with_config(quick());

        let before = service.export().unwrap();
        let reparsed = parse_import_file(&before.to_json().unwrap()).unwrap();
        service
            .import(
                ImportMode::Replace,
                reparsed.budgets.unwrap(),
                reparsed.expenses.unwrap(),
            )
            .unwrap();
        let after = service.export().unwrap();

        assert_eq!(tuples(&before), tuples(&after));
    }

    #[test]
    fn test_merge_import_skips_existing_ids() {
        let (_temp_dir, store) = create_test_store();
        seed(&store);
        let service = TransferService::new(&store).with_config(quick());
        let export = service.export().unwrap();

        let report = service
            .import(ImportMode::Merge, export.budgets, Vec::new())
            .unwrap();

        assert_eq!(report.budgets_imported, 0);
        assert_eq!(report.conflicts.len(), 2);
        assert_eq!(store.budgets.count().unwrap(), 2);
    }

    #[test]
    fn test_import_mints_missing_ids_without_validation() {
        let (_temp_dir, store) = create_test_store();
        let service = TransferService::new(&store).with_config(quick());

        // "Total" would be rejected by the budget service
        let budgets = vec![
            Budget::from_draft(String::new(), BudgetDraft::new("Total", "2025-01", 5.0)),
            Budget::from_draft(String::new(), BudgetDraft::new("Food", "2025-01", 5.0)),
        ];
        let report = service.import(ImportMode::Merge, budgets, Vec::new()).unwrap();

        assert_eq!(report.budgets_imported, 2);
        assert!(store.budgets.find(&Query::all()).unwrap().iter().all(|b| !b.id.is_empty()));
    }

    #[test]
    fn test_import_450_budgets_in_three_paced_batches() {
        let (_temp_dir, store) = create_test_store();
        let service = TransferService::new(&store);
        let budgets: Vec<Budget> = (0..450)
            .map(|i| {
                Budget::from_draft(
                    format!("b{:03}", i),
                    BudgetDraft::new(format!("Budget {}", i), "2025-01", 10.0),
                )
            })
            .collect();

        let started = Instant::now();
        let report = service.import(ImportMode::Merge, budgets, Vec::new()).unwrap();

        assert_eq!(report.budget_batches, vec![200, 200, 50]);
        assert!(report.expense_batches.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(store.budgets.count().unwrap(), 450);
    }

    #[test]
    fn test_small_import_is_one_batch() {
        let (_temp_dir, store) = create_test_store();
        let service = TransferService::new(&store);
        let expenses = vec![Expense::from_draft(
            "e1".into(),
            ExpenseDraft::new(3.0, "Tea", "Misc", "2025-01-01"),
        )];

        let started = Instant::now();
        let report = service.import(ImportMode::Merge, Vec::new(), expenses).unwrap();
        assert_eq!(report.expense_batches, vec![1]);
        assert!(started.elapsed() < IMPORT_CHUNK_PAUSE);
    }

    #[test]
    fn test_parse_import_file_errors() {
        for text in ["not json", "{}", "[1, 2]", r#"{"budgets": "nope"}"#] {
            let err = parse_import_file(text).unwrap_err();
            assert_eq!(err.to_string(), format!("Import error: {}", PARSE_ERROR));
        }

        let only_expenses = parse_import_file(r#"{"expenses": []}"#).unwrap();
        assert!(only_expenses.budgets.is_none());
        assert_eq!(only_expenses.expenses.unwrap().len(), 0);
    }

    #[test]
    fn test_delete_all_data_erases_remote() {
        let (temp_dir, store) = create_test_store();
        seed(&store);
        let remote_dir = temp_dir.path().join("remote");
        let remote_store = Store::open(&remote_dir).unwrap();
        remote_store
            .budgets
            .insert(Budget::from_draft("r1".into(), BudgetDraft::new("Gas", "2025-01", 50.0)))
            .unwrap();
        drop(remote_store);

        let settings = MemorySettings::with_sync_token(remote_dir.to_str().unwrap());
        let connector = DirectoryConnector::new();
        let service = TransferService::new(&store).with_remote(RemoteAccess {
            settings: &settings,
            connector: &connector,
        });

        service.delete_all_data().unwrap();

        assert!(!store.dir().exists());
        assert!(store.budgets.find(&Query::all()).is_err());
        assert_eq!(Store::open(&remote_dir).unwrap().budgets.count().unwrap(), 0);

        store.recreate_collections().unwrap();
        assert_eq!(store.expenses.count().unwrap(), 0);
    }
}
