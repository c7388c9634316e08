//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Side of the reconciliation an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Internal accounting records
    Ledger,
    /// External bank statement records
    Bank,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Ledger => write!(f, "ledger"),
            Side::Bank => write!(f, "bank"),
        }
    }
}

/// Internal accounting transaction to be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier of the ledger transaction
    pub key: String,
    /// Transaction amount, never negative
    pub amount: BigDecimal,
    /// Booking date in the ledger
    pub date: NaiveDate,
}

impl LedgerEntry {
    /// Create a new ledger entry
    pub fn new(key: String, amount: BigDecimal, date: NaiveDate) -> Self {
        Self { key, amount, date }
    }
}

/// Bank statement transaction that ledger entries are reconciled against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankEntry {
    /// Unique identifier of the bank transaction
    pub key: String,
    /// Transaction amount, never negative
    pub amount: BigDecimal,
    /// Value date on the bank statement
    pub date: NaiveDate,
}

impl BankEntry {
    /// Create a new bank entry
    pub fn new(key: String, amount: BigDecimal, date: NaiveDate) -> Self {
        Self { key, amount, date }
    }
}

/// Errors caused by malformed input collections.
///
/// These are reported before any search starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("Duplicate {side} key: {key}")]
    DuplicateKey { side: Side, key: String },
    #[error("Empty {side} key at position {index}")]
    EmptyKey { side: Side, index: usize },
    #[error("Negative amount for {side} entry {key}: {amount}")]
    NegativeAmount {
        side: Side,
        key: String,
        amount: BigDecimal,
    },
    #[error("Amount for {side} entry {key} is out of range: {amount}")]
    AmountOutOfRange {
        side: Side,
        key: String,
        amount: BigDecimal,
    },
}

/// Errors that can occur while reconciling
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),
    #[error("Solver error: {message} (variable: {variable:?}, constraint: {constraint:?})")]
    Solver {
        message: String,
        variable: Option<usize>,
        constraint: Option<usize>,
    },
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
