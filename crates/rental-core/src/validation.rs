//! # Validation Module
//!
//! Input validation utilities for the rental core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request DTOs (rental-ledger)                                 │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field-level rule validation                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business logic (rates / settlement / state machine)          │
//! │  └── Rule violations (InvalidDuration, PaymentExceedsBalance, ...)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  All validation happens BEFORE any mutation; invalid amounts are       │
//! │  rejected errors, never silently clamped.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::MAX_RENTAL_LINES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item duration.
///
/// ## Rules
/// - Must be a positive integer count of rate units
/// - Bounded to keep a typo (e.g. 1000 months) from slipping through
pub fn validate_duration(duration: i64) -> ValidationResult<()> {
    if duration <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "duration".to_string(),
        });
    }

    if duration > 365 {
        return Err(ValidationError::OutOfRange {
            field: "duration".to_string(),
            min: 1,
            max: 365,
        });
    }

    Ok(())
}

/// Validates a unit price in cents.
///
/// Zero is allowed (promotional free lines exist in the catalog);
/// negative prices are not.
pub fn validate_unit_price(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a declared fee (damage, cleaning, deposit) in cents.
pub fn validate_fee_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot pay zero or negative amounts
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates an inclusive date range: start must not be after end.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvalidFormat {
            field: "date range".to_string(),
            reason: format!("start {} is after end {}", start, end),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates free-text notes.
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: 500,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a rental request.
///
/// ## Rules
/// - Must contain at least one line (end date is undefined otherwise)
/// - Must not exceed MAX_RENTAL_LINES
pub fn validate_rental_lines(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if count > MAX_RENTAL_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_RENTAL_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
