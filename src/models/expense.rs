//! Expense model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Budget an expense falls back to when nothing better is known
pub const MISC_BUDGET_NAME: &str = "Misc";

/// A dated transaction attributed to a budget by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default)]
    pub id: String,

    pub cost: f64,

    pub description: String,

    /// Name of the budget in the same month this expense counts against
    pub budget: String,

    /// Date in `YYYY-MM-DD` form
    pub date: String,

    /// Replication revision, managed by the store
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl Expense {
    pub fn from_draft(id: String, draft: ExpenseDraft) -> Self {
        Self {
            id,
            cost: draft.cost,
            description: draft.description,
            budget: draft.budget,
            date: draft.date,
            revision: None,
        }
    }

    /// The `YYYY-MM` month prefix of the expense date
    pub fn month_key(&self) -> &str {
        self.date.get(..7).unwrap_or(&self.date)
    }

    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Expense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]: {}",
            self.date, self.description, self.budget, self.cost
        )
    }
}

/// The caller-editable fields of an expense
///
/// An empty `budget` asks the engine to infer one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub cost: f64,
    pub description: String,
    pub budget: String,
    pub date: String,
}

impl ExpenseDraft {
    pub fn new(
        cost: f64,
        description: impl Into<String>,
        budget: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            cost,
            description: description.into(),
            budget: budget.into(),
            date: date.into(),
        }
    }
}

impl From<&Expense> for ExpenseDraft {
    fn from(expense: &Expense) -> Self {
        Self {
            cost: expense.cost,
            description: expense.description.clone(),
            budget: expense.budget.clone(),
            date: expense.date.clone(),
        }
    }
}
