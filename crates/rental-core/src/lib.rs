//! # rental-core: Pure Business Logic for Rental POS
//!
//! This crate is the **heart** of the rental booking & settlement core.
//! It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Rental POS Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Surrounding application (external)                 │   │
//! │  │   Booking forms ──► Return modal ──► Payment top-up screens    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ request/response                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 rental-ledger (service layer)                   │   │
//! │  │    BookingLedger • AvailabilityIndex • DTOs                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ rental-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌───────┐ ┌──────────┐ │   │
//! │  │  │  types  │ │  rates  │ │settlement │ │ state │ │validation│ │   │
//! │  │  │ Rental  │ │  line   │ │ late fee  │ │ legal │ │  rules   │ │   │
//! │  │  │ Payment │ │ totals  │ │ reconcile │ │ moves │ │  checks  │ │   │
//! │  │  └─────────┘ └─────────┘ └───────────┘ └───────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  rental-db (Database Layer)                     │   │
//! │  │           SQLite queries, migrations, repositories              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Rental, RentalLineItem, Payment, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`rates`] - Rate calculator (line totals, implied days, end dates)
//! - [`settlement`] - Settlement engine (fees + payment reconciliation)
//! - [`state`] - Rental state machine (legal status transitions)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, clock access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use rental_core::money::Money;
//! use rental_core::rates;
//! use rental_core::types::RateType;
//!
//! // Weekly line: 45.00/week for 2 weeks
//! let total = rates::line_total(RateType::Weekly, Money::from_cents(4500), 2).unwrap();
//! assert_eq!(total.cents(), 9000);
//!
//! // A 2-week line implies 14 calendar days
//! assert_eq!(rates::implied_days(RateType::Weekly, 2), 14);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod rates;
pub mod settlement;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use rental_core::Money` instead of
// `use rental_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use settlement::{SettlementInputs, SettlementPaymentType, SettlementResult};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days in a billing week.
pub const DAYS_PER_WEEK: i64 = 7;

/// Days in a billing month.
///
/// A flat 30 days, not a calendar month. This drifts from calendar
/// months over long rentals and is kept as-is from the observed
/// behavior of the surrounding app.
pub const DAYS_PER_MONTH: i64 = 30;

/// Maximum line items allowed in a single rental.
///
/// ## Business Reason
/// Prevents runaway bookings and keeps conflict rollback cheap.
/// Can be made configurable per-branch in future versions.
pub const MAX_RENTAL_LINES: usize = 50;
