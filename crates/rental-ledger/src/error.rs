//! # Ledger Error Types
//!
//! Error taxonomy for booking ledger operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (rental-core)      DbError (rental-db)                      │
//! │       │                            │                                    │
//! │       └──────────┬─────────────────┘                                    │
//! │                  ▼                                                      │
//! │            LedgerError ← One taxonomy for every caller                  │
//! │                                                                         │
//! │  Conflict      → booking denied, winners listed                         │
//! │  InvalidState  → lifecycle guard rejected the operation                 │
//! │  InvalidInput  → request failed validation                              │
//! │  NotFound      → unknown rental / item                                  │
//! │  Internal      → defects (e.g. a settlement that doesn't balance)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::api::BookingConflict;
use rental_core::CoreError;
use rental_db::DbError;

/// Booking ledger operation errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// One or more requested items are already booked for overlapping
    /// dates. Carries the winning reservations so staff can tell the
    /// customer who has the item and until when.
    #[error("{} item(s) unavailable for the requested dates", conflicts.len())]
    Conflict { conflicts: Vec<BookingConflict> },

    /// The rental's lifecycle state does not permit this operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The request failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Database error.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// Internal defect. Settlement imbalances land here: they mean the
    /// math itself went wrong, never bad user input.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Maps core business errors onto the ledger taxonomy.
impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStateTransition { .. } => LedgerError::InvalidState(err.to_string()),
            CoreError::SettlementImbalance { .. } => LedgerError::Internal(err.to_string()),
            other => LedgerError::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
