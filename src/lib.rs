//! # Reconciliation Core
//!
//! Matches internal ledger entries against bank statement entries. Each
//! ledger entry is assigned to at most one bank entry whose date is not
//! earlier than its own, and the ledger amounts assigned to a bank entry may
//! not exceed its amount. Among all such assignments the engine finds one
//! that reconciles as many ledger entries as possible.
//!
//! ## Features
//!
//! - **Exact input model**: `BigDecimal` amounts and calendar dates, checked
//!   exactly on every candidate solution
//! - **LP-based branch-and-bound**: dense simplex relaxations, best-bound or
//!   depth-first search, greedy rounding
//! - **Parallel search**: scoped worker threads sharing one incumbent
//! - **Budgets**: time limit, node limit and cooperative cancellation, all
//!   returning the best matching found so far
//! - **Storage abstraction**: async source and sink traits for loading
//!   entries and persisting results
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{BankEntry, LedgerEntry, MatchingStatus, ReconciliationEngine};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! let date = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//! let ledger = vec![
//!     LedgerEntry::new("INV-1".to_string(), BigDecimal::from(100), date(1)),
//!     LedgerEntry::new("INV-2".to_string(), BigDecimal::from(50), date(2)),
//! ];
//! let bank = vec![BankEntry::new("DEP-1".to_string(), BigDecimal::from(150), date(3))];
//!
//! let matching = ReconciliationEngine::new().reconcile(&ledger, &bank).unwrap();
//! assert_eq!(matching.objective, 2);
//! assert_eq!(matching.status, MatchingStatus::Optimal);
//! ```

pub mod config;
pub mod model;
pub mod reconciliation;
pub mod relaxation;
pub mod search;
pub mod solution;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{NodeSelection, SolverConfig, Threads};
pub use model::ProblemModel;
pub use reconciliation::ReconciliationEngine;
pub use search::{CancellationToken, SearchStatistics, TerminationReason};
pub use solution::{verify_matching, MatchedPair, Matching, MatchingStatus};
pub use traits::*;
pub use types::*;
pub use utils::{MemorySink, MemorySource};
