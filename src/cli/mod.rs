//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the ledger.

pub mod budget;
pub mod expense;
pub mod month;
pub mod sync;
pub mod transfer;

pub use budget::{handle_budget_command, BudgetCommands};
pub use expense::{handle_expense_command, ExpenseCommands};
pub use month::handle_month_command;
pub use sync::{handle_sync_command, SyncCommands};
pub use transfer::{handle_export_command, handle_import_command, handle_reset_command};

use crate::config::SettingName;
use crate::display::DEFAULT_CURRENCY;
use crate::error::TallyResult;
use crate::ledger::{Dispatch, Ledger};

/// Configured currency code, or the default
pub(crate) fn currency(ledger: &Ledger) -> TallyResult<String> {
    let code = ledger.get_setting(SettingName::Currency)?;
    Ok(if code.is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        code
    })
}

/// Print a notice when a guarded operation was skipped
pub(crate) fn report_ignored<T>(dispatch: Dispatch<T>, operation: &str) -> Option<T> {
    let value = dispatch.completed();
    if value.is_none() {
        println!("Another {} is already in progress.", operation);
    }
    value
}

/// Handle `tally currency [CODE]`
pub fn handle_currency_command(ledger: &Ledger, code: Option<String>) -> TallyResult<()> {
    match code {
        Some(code) => {
            let code = code.trim().to_uppercase();
            if report_ignored(ledger.save_setting(SettingName::Currency, &code)?, "settings change")
                .is_some()
            {
                println!("Currency set to {}", code);
            }
        }
        None => println!("{}", currency(ledger)?),
    }
    Ok(())
}
