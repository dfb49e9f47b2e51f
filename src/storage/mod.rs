//! Storage layer for Tally
//!
//! The record store: one file-backed [`Collection`] per document type, plus
//! the low-level erase used when wiping all data.

pub mod collection;
pub mod file_io;
pub mod query;
pub mod revision;

pub use collection::{BulkInsertResult, Change, Collection, Document};
pub use query::Query;
pub use revision::Revision;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::error::TallyResult;
use crate::models::{Budget, Expense};

impl Document for Budget {
    const COLLECTION: &'static str = "budgets";
    const ENTITY: &'static str = "Budget";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn set_revision(&mut self, revision: Option<String>) {
        self.revision = revision;
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "name" => Some(&self.name),
            "month" => Some(&self.month),
            _ => None,
        }
    }
}

impl Document for Expense {
    const COLLECTION: &'static str = "expenses";
    const ENTITY: &'static str = "Expense";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn set_revision(&mut self, revision: Option<String>) {
        self.revision = revision;
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "description" => Some(&self.description),
            "budget" => Some(&self.budget),
            "date" => Some(&self.date),
            _ => None,
        }
    }
}

/// Path of a collection's file inside a database directory
pub fn collection_file<D: Document>(dir: &Path) -> PathBuf {
    dir.join(format!("{}.json", D::COLLECTION))
}

/// The local database: budgets and expenses collections in one directory
pub struct Store {
    dir: PathBuf,
    pub budgets: Arc<Collection<Budget>>,
    pub expenses: Arc<Collection<Expense>>,
}

impl Store {
    /// Open (or create) the database in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> TallyResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            budgets: Arc::new(Collection::open(collection_file::<Budget>(&dir))?),
            expenses: Arc::new(Collection::open(collection_file::<Expense>(&dir))?),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove both collections and erase the database directory
    pub fn erase(&self) -> TallyResult<()> {
        self.budgets.remove_collection()?;
        self.expenses.remove_collection()?;
        file_io::remove_dir_if_exists(&self.dir)?;
        info!(dir = %self.dir.display(), "local database erased");
        Ok(())
    }

    /// Recreate any removed collection so the store is usable again
    pub fn recreate_collections(&self) -> TallyResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        if self.budgets.is_removed() {
            self.budgets.recreate()?;
        }
        if self.expenses.is_removed() {
            self.expenses.recreate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetDraft, ExpenseDraft};
    use tempfile::TempDir;

    #[test]
    fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("db")).unwrap();

        assert!(store.dir().exists());
        assert_eq!(store.budgets.count().unwrap(), 0);
        assert_eq!(store.expenses.count().unwrap(), 0);
    }

    #[test]
    fn test_expense_date_range_query() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path()).unwrap();
        for (id, date) in [("e1", "2025-01-31"), ("e2", "2025-02-01"), ("e3", "2025-02-28")] {
            store
                .expenses
                .insert(Expense::from_draft(
                    id.into(),
                    ExpenseDraft::new(5.0, "Coffee", "Food", date),
                ))
                .unwrap();
        }

        let february = store
            .expenses
            .find(&Query::all().between("date", "2025-02-01", "2025-02-31"))
            .unwrap();
        let ids: Vec<_> = february.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e3"]);
    }

    #[test]
    fn test_erase_and_recreate() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("db");
        let store = Store::open(&dir).unwrap();
        store
            .budgets
            .insert(Budget::from_draft(
                "b1".into(),
                BudgetDraft::new("Food", "2025-01", 100.0),
            ))
            .unwrap();

        store.erase().unwrap();
        assert!(!dir.exists());
        assert!(store.budgets.count().is_err());

        store.recreate_collections().unwrap();
        assert_eq!(store.budgets.count().unwrap(), 0);
        assert!(dir.join("budgets.json").exists());
    }
}
