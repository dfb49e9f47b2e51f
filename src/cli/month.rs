//! Month view command

use super::currency;
use crate::display::{format_expense_list, format_month_summary};
use crate::error::TallyResult;
use crate::ledger::{ExpenseFilter, Ledger};
use crate::models::Month;

/// Handle `tally month [MONTH] [--budget NAME]... [--search TEXT]`
pub fn handle_month_command(
    ledger: &Ledger,
    month: Option<String>,
    filter: ExpenseFilter,
) -> TallyResult<()> {
    let currency = currency(ledger)?;
    let month = month.unwrap_or_else(|| Month::current().to_string());
    let view = ledger.change_month(&month)?;

    println!("{}", view.month);
    println!("{}", "=".repeat(60));
    print!("{}", format_month_summary(&view.summary(), &currency));
    println!();

    if filter.is_empty() {
        print!("{}", format_expense_list(&view.expenses, &currency));
    } else {
        let expenses = view.filtered_expenses(&filter);
        println!("Showing {} of {} expenses", expenses.len(), view.expenses.len());
        print!("{}", format_expense_list(&expenses, &currency));
    }

    if !view.last_sync_date.is_empty() {
        println!("\nLast sync: {}", view.last_sync_date);
    }
    Ok(())
}
