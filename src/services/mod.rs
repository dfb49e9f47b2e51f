//! Service layer for Tally
//!
//! The service layer is the single write path for budgets and expenses. It
//! sits on top of the storage layer, handling validation and the
//! cross-document rules that keep budgets and expenses consistent.

pub mod budget;
pub mod expense;
pub mod month;
pub mod transfer;

pub use budget::BudgetService;
pub use expense::ExpenseService;
pub use month::{MonthDocuments, MonthService};
pub use transfer::{
    parse_import_file, ExportFile, ImportConfig, ImportFile, ImportMode, ImportReport,
    TransferService,
};

use crate::models::{Budget, Expense};

/// Sort budgets by name, ignoring case (stable)
pub(crate) fn sort_by_name(budgets: &mut [Budget]) {
    budgets.sort_by_cached_key(|b| b.name.to_uppercase());
}

/// Sort expenses by date, oldest first (stable)
pub(crate) fn sort_by_date(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| a.date.cmp(&b.date));
}

/// Sort expenses by date, newest first (stable)
pub(crate) fn sort_by_date_desc(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| b.date.cmp(&a.date));
}
