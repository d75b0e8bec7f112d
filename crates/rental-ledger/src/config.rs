//! # Ledger Configuration
//!
//! Per-branch settings for the booking ledger. Values are operator
//! policy, never derived from data.

use rental_core::Money;

/// Booking ledger configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = LedgerConfig::new("branch-1")
///     .daily_late_rate_cents(1500)
///     .rental_number_prefix("RNT");
/// ```
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Branch this ledger serves. Stamped onto every rental.
    pub branch_id: String,

    /// Flat late fee charged per day past the expected end date.
    /// Default: 0 (no late fees until the operator sets a rate)
    pub daily_late_rate_cents: i64,

    /// Prefix for generated rental numbers.
    /// Default: "RNT"
    pub rental_number_prefix: String,
}

impl LedgerConfig {
    /// Creates a configuration for the given branch with defaults.
    pub fn new(branch_id: impl Into<String>) -> Self {
        LedgerConfig {
            branch_id: branch_id.into(),
            daily_late_rate_cents: 0,
            rental_number_prefix: "RNT".to_string(),
        }
    }

    /// Sets the daily late rate in cents.
    pub fn daily_late_rate_cents(mut self, cents: i64) -> Self {
        self.daily_late_rate_cents = cents;
        self
    }

    /// Sets the rental number prefix.
    pub fn rental_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.rental_number_prefix = prefix.into();
        self
    }

    /// Returns the daily late rate as money.
    pub fn daily_late_rate(&self) -> Money {
        Money::from_cents(self.daily_late_rate_cents)
    }
}
