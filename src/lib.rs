//! Tally - monthly budgets and expenses with replication
//!
//! This library provides the data layer of a personal finance tracker:
//! monthly budgets, expenses attributed to them by name, and continuous
//! replication of both against a remote replica.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths and the settings store
//! - `error`: Custom error types
//! - `models`: Budgets, expenses, and month arithmetic
//! - `storage`: File-backed document collections with a change feed
//! - `services`: Validation and consistency rules, month roll-forward,
//!   bulk import and export
//! - `sync`: Replication manager, replicators, and transports
//! - `ledger`: Connection lifecycle and guarded operations for hosts
//! - `reports`: Month rollups
//! - `display` and `cli`: The `tally` command line
//!
//! # Example
//!
//! ```rust,ignore
//! use tally::config::TallyPaths;
//! use tally::models::{BudgetDraft, Month, SaveRequest};
//! use tally::Ledger;
//!
//! let ledger = Ledger::open(&TallyPaths::new()?)?;
//! ledger.save_budget(SaveRequest::Create(BudgetDraft::new("Food", "2025-01", 300.0)))?;
//! let view = ledger.load_month(Month::current())?;
//! ```

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;
pub mod sync;

pub use error::{TallyError, TallyResult};
pub use ledger::{Dispatch, ExpenseFilter, Ledger, MonthView};
