//! Budget CLI commands

use clap::Subcommand;

use super::{currency, report_ignored};
use crate::display::{format_amount, format_budget_list};
use crate::error::TallyResult;
use crate::ledger::Ledger;
use crate::models::{BudgetDraft, Month, SaveRequest};

/// Budget subcommands
#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Create a budget, or update one with --id
    Save {
        /// Budget name
        name: String,
        /// Monthly value
        value: f64,
        /// Month (YYYY-MM); defaults to the current month
        #[arg(short, long)]
        month: Option<String>,
        /// Id of the budget to update
        #[arg(long)]
        id: Option<String>,
    },

    /// List the budgets of a month with their ids
    List {
        /// Month (YYYY-MM); defaults to the current month
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Delete a budget that no expense uses
    Delete {
        /// Budget id
        id: String,
    },
}

/// Handle a budget command
pub fn handle_budget_command(ledger: &Ledger, cmd: BudgetCommands) -> TallyResult<()> {
    let currency = currency(ledger)?;

    match cmd {
        BudgetCommands::Save {
            name,
            value,
            month,
            id,
        } => {
            let request = match id {
                Some(id) => {
                    let existing = ledger.get_budget(&id)?;
                    SaveRequest::Update {
                        id,
                        fields: BudgetDraft::new(name, existing.month, value),
                    }
                }
                None => SaveRequest::Create(BudgetDraft::new(
                    name,
                    month.unwrap_or_else(|| Month::current().to_string()),
                    value,
                )),
            };

            if let Some(budget) = report_ignored(ledger.save_budget(request)?, "budget save") {
                println!(
                    "Saved budget '{}' for {}: {}",
                    budget.name,
                    budget.month,
                    format_amount(budget.value, &currency)
                );
                println!("  ID: {}", budget.id);
            }
        }

        BudgetCommands::List { month } => {
            let month: Month = match month {
                Some(m) => m.parse()?,
                None => Month::current(),
            };
            let budgets = ledger.fetch_budgets(month)?;
            println!("Budgets for {}", month);
            print!("{}", format_budget_list(&budgets, &currency));
        }

        BudgetCommands::Delete { id } => {
            let budget = ledger.get_budget(&id)?;
            if report_ignored(ledger.delete_budget(&id)?, "budget delete").is_some() {
                println!("Deleted budget '{}' from {}", budget.name, budget.month);
            }
        }
    }

    Ok(())
}
