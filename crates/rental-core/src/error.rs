//! # Error Types
//!
//! Domain-specific error types for rental-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rental-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  rental-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  rental-ledger errors (service layer)                                  │
//! │  └── LedgerError      - Conflict / NotFound / taxonomy for callers     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (rental id, amounts, statuses)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::RentalStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line item duration is zero or negative.
    ///
    /// Durations count rate units (days/weeks/months) and must be
    /// positive integers.
    #[error("Invalid duration {duration}: must be a positive integer")]
    InvalidDuration { duration: i64 },

    /// A declared damage or cleaning fee is negative.
    #[error("Negative fee for {field}: {cents} cents")]
    NegativeFee { field: String, cents: i64 },

    /// A partial payment or top-up exceeds the outstanding balance.
    ///
    /// ## When This Occurs
    /// - Partial settlement with payment_amount > remaining
    /// - Post-return top-up with amount > credit_amount
    #[error("Payment of {requested} cents exceeds outstanding balance of {outstanding} cents")]
    PaymentExceedsBalance { requested: i64, outstanding: i64 },

    /// A payment amount that must be positive was zero or negative.
    #[error("Payment amount must be positive, got {cents} cents")]
    PaymentRequired { cents: i64 },

    /// A top-up was attempted on a rental with no outstanding credit.
    #[error("Rental has no outstanding balance")]
    NothingOutstanding,

    /// The requested status transition is not legal.
    ///
    /// ## When This Occurs
    /// - Returning a reserved rental (pickup never happened)
    /// - Cancelling a returned rental
    /// - Activating anything but a reserved rental
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: RentalStatus, to: RentalStatus },

    /// The settlement arithmetic no longer balances.
    ///
    /// `rental_price + late + damage + cleaning` must equal
    /// `paid + credit` after every settlement-affecting mutation. A
    /// violation is an internal defect, not bad input.
    #[error("Settlement imbalance: charges {charges} cents vs covered {covered} cents")]
    SettlementImbalance { charges: i64, covered: i64 },

    /// A rental must contain at least one line item.
    #[error("Rental has no line items")]
    EmptyRental,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
