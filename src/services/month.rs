//! Month loading and roll-forward
//!
//! Loading the current or next month when it has no budgets copies the
//! previous month's budgets into it. Older empty months stay empty.

use tracing::{debug, info};

use super::{BudgetService, ExpenseService};
use crate::error::TallyResult;
use crate::models::{mint_id, Budget, Expense, Month};
use crate::storage::Store;
use crate::sync::SyncGate;

/// Budgets and expenses of one month
#[derive(Debug, Clone, Default)]
pub struct MonthDocuments {
    /// Sorted by name
    pub budgets: Vec<Budget>,
    /// Newest first
    pub expenses: Vec<Expense>,
}

/// Service for month-scoped reads
pub struct MonthService<'a> {
    store: &'a Store,
    gate: &'a dyn SyncGate,
}

impl<'a> MonthService<'a> {
    pub fn new(store: &'a Store, gate: &'a dyn SyncGate) -> Self {
        Self { store, gate }
    }

    /// Month whose budgets seed `requested` when it's empty, if any.
    ///
    /// Only the current and the next calendar month roll forward.
    pub fn rollover_source(requested: Month, current: Month) -> Option<Month> {
        if requested == current || requested == current.next() {
            Some(requested.prev())
        } else {
            None
        }
    }

    fn fetch(&self, month: Month) -> TallyResult<MonthDocuments> {
        Ok(MonthDocuments {
            budgets: BudgetService::new(self.store).fetch_for_month(&month.to_string())?,
            expenses: ExpenseService::new(self.store).fetch_for_month(&month)?,
        })
    }

    /// Load a month, rolling budgets forward relative to the real calendar
    pub fn load(&self, month: Month) -> TallyResult<MonthDocuments> {
        self.load_relative_to(month, Month::current())
    }

    /// Load a month, treating `current` as the current calendar month
    pub fn load_relative_to(&self, month: Month, current: Month) -> TallyResult<MonthDocuments> {
        let documents = self.fetch(month)?;
        if !documents.budgets.is_empty() {
            return Ok(documents);
        }

        match Self::rollover_source(month, current) {
            Some(source) if self.copy_budgets(source, month)? > 0 => self.fetch(month),
            _ => Ok(documents),
        }
    }

    /// Copy every budget of `from` into `to` under fresh ids.
    ///
    /// Does nothing until both collections have finished their first sync,
    /// so a month that is only empty because the pull hasn't arrived yet is
    /// not seeded with duplicates. The copies are one bulk insert; a replica
    /// seeding the same month concurrently can still produce duplicates,
    /// which `BudgetService::delete` tolerates.
    pub fn copy_budgets(&self, from: Month, to: Month) -> TallyResult<usize> {
        if !self.gate.first_sync_done() {
            debug!(%from, %to, "first sync pending, not copying budgets");
            return Ok(0);
        }

        let copies: Vec<Budget> = BudgetService::new(self.store)
            .fetch_for_month(&from.to_string())?
            .into_iter()
            .map(|budget| Budget {
                id: mint_id(),
                month: to.to_string(),
                revision: None,
                ..budget
            })
            .collect();

        if copies.is_empty() {
            return Ok(0);
        }

        let result = self.store.budgets.bulk_insert(copies)?;
        info!(%from, %to, copied = result.inserted, "rolled budgets forward");
        Ok(result.inserted)
    }
}
