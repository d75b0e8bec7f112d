//! # Settlement Engine
//!
//! Return-time computation of final charges and their reconciliation
//! against full / partial / credit payment policies.
//!
//! ## Settlement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Return Settlement                                    │
//! │                                                                         │
//! │  total_cost = rental_price + late_fee + damage_fee + cleaning_fee      │
//! │  remaining  = total_cost - paid_so_far   (deposit etc.)                │
//! │                                                                         │
//! │  payment_type:                                                         │
//! │    full    → payment forced to remaining; paid = total_cost;           │
//! │              credit = 0                                                │
//! │    partial → 0 < payment <= remaining; paid += payment;                │
//! │              credit = remaining - payment                              │
//! │    credit  → payment forced to 0; credit = remaining;                  │
//! │              paid unchanged                                            │
//! │                                                                         │
//! │  Post-condition (re-checked here, a violation is an internal           │
//! │  defect, not bad input):                                               │
//! │    rental_price + late + damage + cleaning == paid + credit            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure: dates, balances, and fee inputs come in as
//! arguments; the caller persists the results and appends the payment
//! record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DamageEntry, PaymentStatus};

// =============================================================================
// Fee Calculations
// =============================================================================

/// Late fee: `max(0, days late) × daily_late_rate`.
///
/// Zero when the item comes back on or before the expected end date.
/// Dates are whole days, so "days late" is a plain signed difference.
pub fn late_fee(
    expected_end_date: NaiveDate,
    actual_return_date: NaiveDate,
    daily_late_rate: Money,
) -> Money {
    let days_late = (actual_return_date - expected_end_date).num_days().max(0);
    daily_late_rate.multiply_units(days_late)
}

/// Damage fee: sum of all declared repair fees across every checklist
/// field marked damaged on every item.
///
/// ## Errors
/// `NegativeFee` if any single entry's fee is negative — each fee is
/// independently non-negative, rejected before any mutation.
pub fn damage_fee(entries: &[DamageEntry]) -> CoreResult<Money> {
    let mut total = Money::zero();
    for entry in entries {
        if entry.fee_cents < 0 {
            return Err(CoreError::NegativeFee {
                field: entry.checklist_field.clone(),
                cents: entry.fee_cents,
            });
        }
        total += Money::from_cents(entry.fee_cents);
    }
    Ok(total)
}

/// Cleaning fee: the declared amount when cleaning is needed, else zero.
pub fn cleaning_fee(needs_cleaning: bool, declared_amount: Money) -> CoreResult<Money> {
    if declared_amount.is_negative() {
        return Err(CoreError::NegativeFee {
            field: "cleaning_fee".to_string(),
            cents: declared_amount.cents(),
        });
    }
    Ok(if needs_cleaning {
        declared_amount
    } else {
        Money::zero()
    })
}

// =============================================================================
// Settlement
// =============================================================================

/// How the customer covers the remaining balance at return time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPaymentType {
    /// Pay off the whole remaining balance now.
    Full,
    /// Pay part now; the rest becomes outstanding credit.
    Partial,
    /// Pay nothing now; the entire shortfall becomes outstanding debt.
    Credit,
}

/// Inputs to [`settle`], all captured before any mutation.
#[derive(Debug, Clone)]
pub struct SettlementInputs<'a> {
    /// Sum of line totals at booking (plus any extensions).
    pub rental_price: Money,
    /// Amounts already paid prior to return (e.g. deposit).
    pub paid_so_far: Money,
    pub expected_end_date: NaiveDate,
    pub actual_return_date: NaiveDate,
    /// Late fee per day, from configuration.
    pub daily_late_rate: Money,
    pub damage_entries: &'a [DamageEntry],
    pub needs_cleaning: bool,
    pub cleaning_amount: Money,
    pub payment_type: SettlementPaymentType,
    /// Caller-supplied payment. Ignored for `Full` (forced to the
    /// remaining balance) and `Credit` (forced to zero).
    pub payment_amount: Money,
}

/// The computed settlement totals, ready for the ledger to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub late_fee_cents: i64,
    pub damage_fee_cents: i64,
    pub cleaning_fee_cents: i64,
    /// rental_price + all fees.
    pub total_cost_cents: i64,
    /// The payment actually taken now (zero means no record appended).
    pub payment_amount_cents: i64,
    pub new_paid_cents: i64,
    pub new_credit_cents: i64,
    pub payment_status: PaymentStatus,
    pub days_late: i64,
}

/// Computes final settlement amounts and reconciles the payment policy
/// against the remaining balance.
///
/// Pure: returns the totals; the caller persists them, appends the
/// payment record for any positive payment amount, and transitions the
/// rental to returned.
pub fn settle(inputs: SettlementInputs<'_>) -> CoreResult<SettlementResult> {
    let late = late_fee(
        inputs.expected_end_date,
        inputs.actual_return_date,
        inputs.daily_late_rate,
    );
    let damage = damage_fee(inputs.damage_entries)?;
    let cleaning = cleaning_fee(inputs.needs_cleaning, inputs.cleaning_amount)?;

    let total_cost = inputs.rental_price + late + damage + cleaning;
    let remaining = total_cost - inputs.paid_so_far;

    let (payment, new_paid, new_credit) = match inputs.payment_type {
        SettlementPaymentType::Full => {
            // Payment is forced to the remaining balance regardless of
            // what the caller supplied.
            (remaining, total_cost, Money::zero())
        }
        SettlementPaymentType::Partial => {
            let amount = inputs.payment_amount;
            if !amount.is_positive() {
                return Err(CoreError::PaymentRequired {
                    cents: amount.cents(),
                });
            }
            if amount > remaining {
                return Err(CoreError::PaymentExceedsBalance {
                    requested: amount.cents(),
                    outstanding: remaining.cents(),
                });
            }
            (amount, inputs.paid_so_far + amount, remaining - amount)
        }
        SettlementPaymentType::Credit => {
            // The entire shortfall becomes outstanding debt.
            (Money::zero(), inputs.paid_so_far, remaining)
        }
    };

    let result = SettlementResult {
        late_fee_cents: late.cents(),
        damage_fee_cents: damage.cents(),
        cleaning_fee_cents: cleaning.cents(),
        total_cost_cents: total_cost.cents(),
        payment_amount_cents: payment.cents(),
        new_paid_cents: new_paid.cents(),
        new_credit_cents: new_credit.cents(),
        payment_status: PaymentStatus::from_balances(new_paid, new_credit),
        days_late: (inputs.actual_return_date - inputs.expected_end_date)
            .num_days()
            .max(0),
    };

    // The invariant must hold by construction; a violation here is an
    // arithmetic defect and is never surfaced as a user error.
    let covered = result.new_paid_cents + result.new_credit_cents;
    if result.total_cost_cents != covered {
        return Err(CoreError::SettlementImbalance {
            charges: result.total_cost_cents,
            covered,
        });
    }

    Ok(result)
}

// =============================================================================
// Post-Return Top-Up
// =============================================================================

/// Validates a post-return debt collection payment (§ payment top-up).
///
/// Permitted only while credit remains; amount must satisfy
/// `0 < amount <= credit`. Amount zero is rejected, never silently
/// accepted.
pub fn validate_top_up(credit: Money, amount: Money) -> CoreResult<()> {
    if !credit.is_positive() {
        return Err(CoreError::NothingOutstanding);
    }
    if !amount.is_positive() {
        return Err(CoreError::PaymentRequired {
            cents: amount.cents(),
        });
    }
    if amount > credit {
        return Err(CoreError::PaymentExceedsBalance {
            requested: amount.cents(),
            outstanding: credit.cents(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn damage(field: &str, fee_cents: i64) -> DamageEntry {
        DamageEntry {
            line_item_id: "li1".to_string(),
            checklist_field: field.to_string(),
            fee_cents,
            notes: None,
        }
    }

    fn base_inputs(entries: &[DamageEntry]) -> SettlementInputs<'_> {
        SettlementInputs {
            rental_price: Money::from_cents(10000),
            paid_so_far: Money::zero(),
            expected_end_date: date(2026, 6, 5),
            actual_return_date: date(2026, 6, 5),
            daily_late_rate: Money::from_cents(1500),
            damage_entries: entries,
            needs_cleaning: false,
            cleaning_amount: Money::zero(),
            payment_type: SettlementPaymentType::Full,
            payment_amount: Money::zero(),
        }
    }

    #[test]
    fn test_late_fee() {
        let rate = Money::from_cents(1500);
        assert_eq!(late_fee(date(2026, 6, 5), date(2026, 6, 8), rate).cents(), 4500);
        // On time or early: zero
        assert_eq!(late_fee(date(2026, 6, 5), date(2026, 6, 5), rate).cents(), 0);
        assert_eq!(late_fee(date(2026, 6, 5), date(2026, 6, 3), rate).cents(), 0);
    }

    #[test]
    fn test_damage_fee_sums_entries() {
        let entries = vec![damage("lens", 2000), damage("strap", 500)];
        assert_eq!(damage_fee(&entries).unwrap().cents(), 2500);
        assert_eq!(damage_fee(&[]).unwrap().cents(), 0);
    }

    #[test]
    fn test_damage_fee_rejects_negative() {
        let entries = vec![damage("lens", 2000), damage("strap", -1)];
        assert!(matches!(
            damage_fee(&entries),
            Err(CoreError::NegativeFee { cents: -1, .. })
        ));
    }

    #[test]
    fn test_cleaning_fee() {
        let amount = Money::from_cents(1000);
        assert_eq!(cleaning_fee(true, amount).unwrap().cents(), 1000);
        assert_eq!(cleaning_fee(false, amount).unwrap().cents(), 0);
        assert!(cleaning_fee(true, Money::from_cents(-5)).is_err());
    }

    /// Scenario from the business rules: price 100.00, 3 days late at
    /// 15.00/day, one damaged checklist item at 20.00, no cleaning;
    /// partial payment of 100.00.
    #[test]
    fn test_settle_partial_three_days_late_with_damage() {
        let entries = vec![damage("zipper", 2000)];
        let mut inputs = base_inputs(&entries);
        inputs.actual_return_date = date(2026, 6, 8);
        inputs.payment_type = SettlementPaymentType::Partial;
        inputs.payment_amount = Money::from_cents(10000);

        let result = settle(inputs).unwrap();
        assert_eq!(result.late_fee_cents, 4500);
        assert_eq!(result.damage_fee_cents, 2000);
        assert_eq!(result.total_cost_cents, 16500);
        assert_eq!(result.payment_amount_cents, 10000);
        assert_eq!(result.new_paid_cents, 10000);
        assert_eq!(result.new_credit_cents, 6500);
        assert_eq!(result.payment_status, PaymentStatus::Partial);
        assert_eq!(result.days_late, 3);
    }

    /// Full settlement forces credit to zero regardless of any
    /// caller-supplied payment amount.
    #[test]
    fn test_settle_full_forces_credit_to_zero() {
        let entries = vec![damage("lens", 2000)];
        let mut inputs = base_inputs(&entries);
        inputs.actual_return_date = date(2026, 6, 8);
        inputs.payment_type = SettlementPaymentType::Full;
        inputs.payment_amount = Money::from_cents(1); // ignored

        let result = settle(inputs).unwrap();
        assert_eq!(result.total_cost_cents, 16500);
        assert_eq!(result.payment_amount_cents, 16500);
        assert_eq!(result.new_paid_cents, 16500);
        assert_eq!(result.new_credit_cents, 0);
        assert_eq!(result.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_settle_full_accounts_for_deposit() {
        let mut inputs = base_inputs(&[]);
        inputs.paid_so_far = Money::from_cents(3000);

        let result = settle(inputs).unwrap();
        // Only the remaining 70.00 is taken now
        assert_eq!(result.payment_amount_cents, 7000);
        assert_eq!(result.new_paid_cents, 10000);
        assert_eq!(result.new_credit_cents, 0);
    }

    #[test]
    fn test_settle_credit_books_entire_shortfall() {
        let mut inputs = base_inputs(&[]);
        inputs.paid_so_far = Money::from_cents(3000);
        inputs.payment_type = SettlementPaymentType::Credit;
        inputs.payment_amount = Money::from_cents(9999); // forced to zero

        let result = settle(inputs).unwrap();
        assert_eq!(result.payment_amount_cents, 0);
        assert_eq!(result.new_paid_cents, 3000);
        assert_eq!(result.new_credit_cents, 7000);
        assert_eq!(result.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_settle_partial_rejects_zero_and_excess() {
        let mut inputs = base_inputs(&[]);
        inputs.payment_type = SettlementPaymentType::Partial;

        inputs.payment_amount = Money::zero();
        assert!(matches!(
            settle(inputs.clone()),
            Err(CoreError::PaymentRequired { .. })
        ));

        inputs.payment_amount = Money::from_cents(10001);
        assert!(matches!(
            settle(inputs),
            Err(CoreError::PaymentExceedsBalance { .. })
        ));
    }

    #[test]
    fn test_settle_always_balances() {
        // Sweep a few payment shapes; the invariant must hold for all.
        for (payment_type, payment) in [
            (SettlementPaymentType::Full, 0),
            (SettlementPaymentType::Partial, 2500),
            (SettlementPaymentType::Partial, 10000),
            (SettlementPaymentType::Credit, 0),
        ] {
            let entries = vec![damage("hem", 1500)];
            let mut inputs = base_inputs(&entries);
            inputs.actual_return_date = date(2026, 6, 7);
            inputs.needs_cleaning = true;
            inputs.cleaning_amount = Money::from_cents(800);
            inputs.payment_type = payment_type;
            inputs.payment_amount = Money::from_cents(payment);

            let result = settle(inputs).unwrap();
            assert_eq!(
                result.total_cost_cents,
                result.new_paid_cents + result.new_credit_cents,
            );
        }
    }

    #[test]
    fn test_validate_top_up() {
        let credit = Money::from_cents(6500);

        assert!(validate_top_up(credit, Money::from_cents(6500)).is_ok());
        assert!(validate_top_up(credit, Money::from_cents(100)).is_ok());

        // Amount above the outstanding balance
        assert!(matches!(
            validate_top_up(credit, Money::from_cents(6501)),
            Err(CoreError::PaymentExceedsBalance { .. })
        ));
        // Zero is rejected, not silently accepted
        assert!(matches!(
            validate_top_up(credit, Money::zero()),
            Err(CoreError::PaymentRequired { .. })
        ));
        // Nothing outstanding
        assert!(matches!(
            validate_top_up(Money::zero(), Money::from_cents(100)),
            Err(CoreError::NothingOutstanding)
        ));
    }
}
