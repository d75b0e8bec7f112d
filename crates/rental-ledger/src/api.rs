//! # Request / Response Types
//!
//! Serializable DTOs for the booking ledger's public operations. The
//! transport layer (desktop app, HTTP handler) works in these; domain
//! types never cross that boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rental_core::{PaymentMethod, PaymentStatus, RentalStatus};

// =============================================================================
// Availability
// =============================================================================

/// Request to check whether items are free for a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAvailabilityRequest {
    pub inventory_item_ids: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Availability verdict with the full conflict listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAvailabilityResponse {
    pub available: bool,
    pub conflicts: Vec<BookingConflict>,
    /// Items that can never be booked right now (maintenance or
    /// retired), regardless of dates. Unknown items are a NotFound
    /// error, not an entry here.
    pub out_of_service: Vec<String>,
}

/// One existing reservation that blocks a request. Names the winning
/// rental so the counter can tell the customer who has the item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingConflict {
    pub inventory_item_id: String,
    pub rental_number: String,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// =============================================================================
// Booking
// =============================================================================

/// One requested line in a new rental.
///
/// Exactly one of `inventory_item_id` and `product_id` must be set: a
/// specific unit, or "any free unit of this product" with the ledger
/// picking one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalLineRequest {
    /// The specific unit to book.
    pub inventory_item_id: Option<String>,
    /// Book any free bookable unit of this product instead.
    pub product_id: Option<String>,
    /// "daily" | "weekly" | "monthly"
    pub rate_type: rental_core::RateType,
    /// Count of rate periods, not calendar days.
    pub duration: i64,
    /// Negotiated price override in cents; the catalog rate applies
    /// when omitted.
    pub unit_price_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Request to create a rental.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRentalRequest {
    pub customer_id: String,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub lines: Vec<RentalLineRequest>,
    /// Opening payment taken at the counter, in cents. Zero books the
    /// whole price as customer debt.
    pub deposit_cents: i64,
    pub deposit_method: Option<PaymentMethod>,
    /// True when the customer walks out with the items immediately;
    /// false books a future pickup (reserved).
    pub pickup_now: bool,
    pub collateral: Option<String>,
}

// =============================================================================
// Return / settlement
// =============================================================================

/// One checklist field marked damaged during the return inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageFieldInput {
    /// Which checklist field (lens, zipper, ...).
    pub field: String,
    pub fee_cents: i64,
    pub notes: Option<String>,
}

/// Per-item inspection result at return time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItemInput {
    pub line_item_id: String,
    /// "good" | "damaged" | "lost"
    pub condition: rental_core::ItemCondition,
    /// Damaged checklist fields, each with its own fee.
    #[serde(default)]
    pub damage: Vec<DamageFieldInput>,
}

/// Request to return a rental and settle its account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRentalRequest {
    pub rental_id: String,
    /// Return date for the late-fee calculation. Defaults to today
    /// when omitted (back-dated returns are an operator correction).
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub items: Vec<ReturnItemInput>,
    pub needs_cleaning: bool,
    pub cleaning_fee_cents: i64,
    /// "full" | "partial" | "credit"
    pub payment_type: rental_core::SettlementPaymentType,
    /// Amount tendered now, in cents. Ignored for full (computed) and
    /// credit (zero) settlements.
    pub payment_amount_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub send_sms: bool,
    pub send_telegram: bool,
}

/// Settlement figures returned to the counter after a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementView {
    pub rental_price_cents: i64,
    pub late_fee_cents: i64,
    pub damage_fee_cents: i64,
    pub cleaning_fee_cents: i64,
    pub total_cost_cents: i64,
    pub days_late: i64,
    pub payment_amount_cents: i64,
    pub paid_cents: i64,
    pub credit_cents: i64,
    pub payment_status: PaymentStatus,
}

// =============================================================================
// Payments
// =============================================================================

/// Request to collect money against an outstanding balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentRequest {
    pub rental_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub notes: Option<String>,
}

/// Balances after a payment was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentResponse {
    pub rental_id: String,
    pub paid_cents: i64,
    pub credit_cents: i64,
    pub payment_status: PaymentStatus,
}

// =============================================================================
// Views
// =============================================================================

/// One line of a rental as shown to the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalLineView {
    pub line_item_id: String,
    pub inventory_item_id: String,
    pub name: String,
    pub rate_type: rental_core::RateType,
    pub unit_price_cents: i64,
    pub duration: i64,
    pub line_total_cents: i64,
    pub condition_on_return: Option<rental_core::ItemCondition>,
    pub damage_fee_cents: i64,
}

/// A rental as shown to the counter.
///
/// `status` is the effective status: a stored `active` rental past its
/// end date reads as `overdue` here without any database write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalView {
    pub rental_id: String,
    pub rental_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: RentalStatus,
    pub payment_status: PaymentStatus,
    pub rental_price_cents: i64,
    pub late_fee_cents: i64,
    pub damage_fee_cents: i64,
    pub cleaning_fee_cents: i64,
    pub total_cost_cents: i64,
    pub paid_cents: i64,
    pub credit_cents: i64,
    pub collateral: Option<String>,
    pub lines: Vec<RentalLineView>,
}
