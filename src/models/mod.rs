//! Core data models for Tally
//!
//! Budgets (monthly caps) and expenses (dated transactions), plus the month
//! arithmetic both depend on.

pub mod budget;
pub mod expense;
pub mod ids;
pub mod month;

pub use budget::{Budget, BudgetDraft, DEFAULT_BUDGET_VALUE, TOTAL_BUDGET_NAME};
pub use expense::{Expense, ExpenseDraft, MISC_BUDGET_NAME};
pub use ids::mint_id;
pub use month::{now_timestamp, parse_date, today_string, Month};

/// A save request: create a new document or patch an existing one
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest<F> {
    Create(F),
    Update { id: String, fields: F },
}

impl<F> SaveRequest<F> {
    pub fn fields(&self) -> &F {
        match self {
            Self::Create(fields) | Self::Update { fields, .. } => fields,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }
}
