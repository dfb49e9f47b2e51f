//! Expense CLI commands

use clap::Subcommand;

use super::{currency, report_ignored};
use crate::display::format_amount;
use crate::error::TallyResult;
use crate::ledger::Ledger;
use crate::models::{today_string, ExpenseDraft, SaveRequest};

/// Expense subcommands
#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// Amount spent
        cost: f64,
        /// What it was for
        description: String,
        /// Budget name; guessed from earlier expenses when omitted
        #[arg(short, long)]
        budget: Option<String>,
        /// Date (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Change an expense; omitted fields keep their value
    Edit {
        /// Expense id
        id: String,
        #[arg(short, long)]
        cost: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        budget: Option<String>,
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense id
        id: String,
    },
}

/// Handle an expense command
pub fn handle_expense_command(ledger: &Ledger, cmd: ExpenseCommands) -> TallyResult<()> {
    let currency = currency(ledger)?;

    let request = match cmd {
        ExpenseCommands::Add {
            cost,
            description,
            budget,
            date,
        } => SaveRequest::Create(ExpenseDraft::new(
            cost,
            description,
            budget.unwrap_or_default(),
            date.unwrap_or_else(today_string),
        )),

        ExpenseCommands::Edit {
            id,
            cost,
            description,
            budget,
            date,
        } => {
            let existing = ledger.get_expense(&id)?;
            SaveRequest::Update {
                id,
                fields: ExpenseDraft::new(
                    cost.unwrap_or(existing.cost),
                    description.unwrap_or(existing.description),
                    budget.unwrap_or(existing.budget),
                    date.unwrap_or(existing.date),
                ),
            }
        }

        ExpenseCommands::Delete { id } => {
            let expense = ledger.get_expense(&id)?;
            if report_ignored(ledger.delete_expense(&id)?, "expense delete").is_some() {
                println!(
                    "Deleted expense '{}' ({}) from {}",
                    expense.description,
                    format_amount(expense.cost, &currency),
                    expense.date
                );
            }
            return Ok(());
        }
    };

    if let Some(expense) = report_ignored(ledger.save_expense(request)?, "expense save") {
        println!(
            "Saved expense '{}': {} in {} on {}",
            expense.description,
            format_amount(expense.cost, &currency),
            expense.budget,
            expense.date
        );
        println!("  ID: {}", expense.id);
    }
    Ok(())
}
