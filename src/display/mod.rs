//! Display formatting for terminal output
//!
//! Plain-text tables for months, budgets, expenses, and sync status.

pub mod money;
pub mod month;

pub use money::{currency_symbol, format_amount, truncate, DEFAULT_CURRENCY};
pub use month::{format_budget_list, format_expense_list, format_month_summary, format_sync_status};
