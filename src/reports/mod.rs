//! Reports for Tally
//!
//! Rollups computed from a loaded month; nothing here is stored.

pub mod summary;

pub use summary::{BudgetRow, MonthSummary};
