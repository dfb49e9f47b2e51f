//! Month display formatting
//!
//! Formats a loaded month for terminal output: the budget rollup table and
//! the expense register.

use super::money::{format_amount, truncate};
use crate::models::{Budget, Expense};
use crate::reports::MonthSummary;
use crate::sync::{SessionPhase, SyncStatus};

/// Format the per-budget rollup, with the total row last
pub fn format_month_summary(summary: &MonthSummary, currency: &str) -> String {
    if summary.rows.is_empty() {
        return format!(
            "No budgets for {}.\n\nAdd one with 'tally budget save <NAME> <VALUE>'.\n",
            summary.month
        );
    }

    let name_width = summary
        .rows_with_total()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<width$}  {:>12}  {:>12}  {:>12}\n",
        "Budget",
        "Value",
        "Spent",
        "Remaining",
        width = name_width
    ));
    output.push_str(&"-".repeat(name_width + 42));
    output.push('\n');

    for (i, row) in summary.rows_with_total().enumerate() {
        if i == summary.rows.len() {
            output.push_str(&"-".repeat(name_width + 42));
            output.push('\n');
        }
        let marker = if row.is_overspent() { " *" } else { "" };
        output.push_str(&format!(
            "{:<width$}  {:>12}  {:>12}  {:>12}{}\n",
            row.name,
            format_amount(row.value, currency),
            format_amount(row.spent, currency),
            format_amount(row.remaining(), currency),
            marker,
            width = name_width
        ));
    }

    output
}

/// Format a month's expenses as a register, newest first
pub fn format_expense_list(expenses: &[Expense], currency: &str) -> String {
    if expenses.is_empty() {
        return "No expenses.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:10}  {:24}  {:16}  {:>10}  ID\n",
        "Date", "Description", "Budget", "Cost"
    ));
    output.push_str(&"-".repeat(72));
    output.push('\n');

    for expense in expenses {
        output.push_str(&format!(
            "{:10}  {:24}  {:16}  {:>10}  {}\n",
            expense.date,
            truncate(&expense.description, 24),
            truncate(&expense.budget, 16),
            format_amount(expense.cost, currency),
            expense.id
        ));
    }

    output
}

/// Format budgets with their ids, for picking one to edit or delete
pub fn format_budget_list(budgets: &[Budget], currency: &str) -> String {
    if budgets.is_empty() {
        return "No budgets.\n".to_string();
    }

    let name_width = budgets
        .iter()
        .map(|b| b.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    for budget in budgets {
        output.push_str(&format!(
            "{:<width$}  {:>12}  {}\n",
            budget.name,
            format_amount(budget.value, currency),
            budget.id,
            width = name_width
        ));
    }
    output
}

pub fn format_sync_status(status: &SyncStatus) -> String {
    let mut output = String::new();
    let mode = match status.phase {
        SessionPhase::Disconnected => "disconnected",
        SessionPhase::LocalOnly => "local only (no sync token)",
        SessionPhase::Syncing => "syncing",
    };
    output.push_str(&format!("Mode:           {}\n", mode));

    if let Some(remote) = &status.remote {
        output.push_str(&format!("Remote:         {}\n", remote));
        let flag = |on: bool| if on { "yes" } else { "no" };
        output.push_str(&format!(
            "Reachable:      budgets {}, expenses {}\n",
            flag(status.alive.budgets),
            flag(status.alive.expenses)
        ));
        output.push_str(&format!(
            "First sync:     budgets {}, expenses {}\n",
            flag(status.first_sync.budgets),
            flag(status.first_sync.expenses)
        ));
    }

    let last = if status.last_sync_date.is_empty() {
        "never"
    } else {
        status.last_sync_date.as_str()
    };
    output.push_str(&format!("Last sync:      {}\n", last));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetDraft, ExpenseDraft, Month};

    #[test]
    fn test_summary_table() {
        let budgets = vec![Budget::from_draft(
            "b1".into(),
            BudgetDraft::new("Food", "2025-03", 100.0),
        )];
        let expenses = vec![Expense::from_draft(
            "e1".into(),
            ExpenseDraft::new(150.0, "Feast", "Food", "2025-03-01"),
        )];
        let summary = MonthSummary::compute(Month::new(2025, 3).unwrap(), &budgets, &expenses);

        let output = format_month_summary(&summary, "USD");
        assert!(output.contains("Food"));
        assert!(output.contains("-$50.00 *"));
        assert!(output.lines().last().unwrap().starts_with("Total"));
    }

    #[test]
    fn test_empty_views() {
        let summary = MonthSummary::compute(Month::new(2025, 3).unwrap(), &[], &[]);
        assert!(format_month_summary(&summary, "USD").starts_with("No budgets for 2025-03."));
        assert_eq!(format_expense_list(&[], "USD"), "No expenses.\n");
    }

    #[test]
    fn test_sync_status_local_only() {
        let status = SyncStatus {
            phase: SessionPhase::LocalOnly,
            ..SyncStatus::default()
        };
        let output = format_sync_status(&status);
        assert!(output.contains("local only"));
        assert!(output.contains("never"));
        assert!(!output.contains("Remote"));
    }
}
