//! # Rate Calculator
//!
//! Pure pricing math for rental line items.
//!
//! ## Pricing Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Flat Rate Tiers                                      │
//! │                                                                         │
//! │  Line: (rate_type, unit_price, duration)                               │
//! │       │                                                                 │
//! │       ├── line_total   = unit_price × duration                         │
//! │       │                                                                 │
//! │       └── implied_days = daily   → duration                            │
//! │                          weekly  → duration × 7                        │
//! │                          monthly → duration × 30  (flat month)         │
//! │                                                                         │
//! │  Rental end_date = start_date + max(implied_days over all lines)       │
//! │                                                                         │
//! │  Recomputed from scratch on every line change: later lines may         │
//! │  shrink the overall duration as well as grow it.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is deterministic and side-effect free; the same
//! inputs always produce the same outputs.

use chrono::{Duration, NaiveDate};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{RateType, RentalLineItem};
use crate::{DAYS_PER_MONTH, DAYS_PER_WEEK};

/// Computes the total for one line: `unit_price × duration`.
///
/// ## Errors
/// `InvalidDuration` if duration is zero or negative.
///
/// ## Example
/// ```rust
/// use rental_core::money::Money;
/// use rental_core::rates::line_total;
/// use rental_core::types::RateType;
///
/// let total = line_total(RateType::Weekly, Money::from_cents(4500), 2).unwrap();
/// assert_eq!(total.cents(), 9000);
/// ```
pub fn line_total(rate_type: RateType, unit_price: Money, duration: i64) -> CoreResult<Money> {
    if duration <= 0 {
        return Err(CoreError::InvalidDuration { duration });
    }
    let _ = rate_type; // the rate type changes the implied days, not the total
    Ok(unit_price.multiply_units(duration))
}

/// Converts a (rate type, duration) pair into calendar days.
///
/// A "month" is a flat 30 days, never a calendar month. This is a
/// documented simplification preserved from the observed behavior: a
/// 1-month rental starting Feb 1 ends Mar 3, not Mar 1.
pub fn implied_days(rate_type: RateType, duration: i64) -> i64 {
    match rate_type {
        RateType::Daily => duration,
        RateType::Weekly => duration * DAYS_PER_WEEK,
        RateType::Monthly => duration * DAYS_PER_MONTH,
    }
}

/// Derives the rental end date: `start_date + max(implied_days)`.
///
/// Returns `None` for an empty line set — the end date is undefined
/// until at least one line exists, and callers must not derive it
/// before then.
pub fn rental_end_date(start_date: NaiveDate, lines: &[RentalLineItem]) -> Option<NaiveDate> {
    let max_days = lines
        .iter()
        .map(|line| implied_days(line.rate_type, line.duration))
        .max()?;
    Some(start_date + Duration::days(max_days))
}

/// Sums the line totals into the rental price.
pub fn rental_price(lines: &[RentalLineItem]) -> Money {
    lines.iter().map(|line| line.line_total()).sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
