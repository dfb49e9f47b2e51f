//! Budget model
//!
//! A budget is a named spending cap for one calendar month. Expenses point at
//! budgets by `(name, month)`, not by id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name reserved for the synthetic per-month rollup row
pub const TOTAL_BUDGET_NAME: &str = "Total";

/// Value given to budgets created on behalf of an expense
pub const DEFAULT_BUDGET_VALUE: f64 = 100.0;

/// A monthly spending cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default)]
    pub id: String,

    pub name: String,

    /// Month in `YYYY-MM` form
    pub month: String,

    pub value: f64,

    /// Replication revision, managed by the store
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl Budget {
    /// Build a budget document from caller-supplied fields
    pub fn from_draft(id: String, draft: BudgetDraft) -> Self {
        Self {
            id,
            name: draft.name,
            month: draft.month,
            value: draft.value,
            revision: None,
        }
    }

    /// Copy of this budget without its replication revision
    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.month, self.value)
    }
}

/// The caller-editable fields of a budget
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDraft {
    pub name: String,
    pub month: String,
    pub value: f64,
}

impl BudgetDraft {
    pub fn new(name: impl Into<String>, month: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            month: month.into(),
            value,
        }
    }
}

impl From<&Budget> for BudgetDraft {
    fn from(budget: &Budget) -> Self {
        Self {
            name: budget.name.clone(),
            month: budget.month.clone(),
            value: budget.value,
        }
    }
}
