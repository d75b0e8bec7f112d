//! # Domain Types
//!
//! Core domain types for the rental booking & settlement core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌─────────────────┐   ┌─────────────────┐      │
//! │  │ InventoryItem    │   │     Rental      │   │    Payment      │      │
//! │  │  ──────────────  │   │  ─────────────  │   │  ─────────────  │      │
//! │  │  id (UUID)       │   │  id (UUID)      │   │  id (UUID)      │      │
//! │  │  product_id      │   │  rental_number  │   │  rental_id (FK) │      │
//! │  │  daily/weekly/   │   │  status         │   │  method         │      │
//! │  │  monthly rates   │   │  price + fees   │   │  amount_cents   │      │
//! │  │  status          │   │  paid + credit  │   │  (append-only)  │      │
//! │  └──────────────────┘   └─────────────────┘   └─────────────────┘      │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌─────────────────┐   ┌─────────────────┐      │
//! │  │    RateType      │   │  RentalStatus   │   │ PaymentStatus   │      │
//! │  │  Daily           │   │  Reserved       │   │  Credit         │      │
//! │  │  Weekly          │   │  Active         │   │  Partial        │      │
//! │  │  Monthly         │   │  Overdue        │   │  Paid           │      │
//! │  └──────────────────┘   │  Returned       │   └─────────────────┘      │
//! │                         │  Cancelled      │                            │
//! │                         └─────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where staff need one (rental_number) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Rate Type
// =============================================================================

/// The billing unit of a rental line.
///
/// Pricing uses flat rate tiers: a line is billed as
/// `unit_price × duration` where duration counts these units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Billed per day.
    Daily,
    /// Billed per week (7 days).
    Weekly,
    /// Billed per month (flat 30 days, not a calendar month).
    Monthly,
}

// =============================================================================
// Rental Status
// =============================================================================

/// The lifecycle status of a rental.
///
/// Legal transitions are enforced by the state machine in [`crate::state`]:
/// reserved → active → {returned, cancelled}; overdue → {returned,
/// cancelled}; reserved → cancelled. `Overdue` is derived at read time
/// (today past end_date), never written by a manual transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    /// Booked but not yet picked up. Blocks the interval, not the item
    /// status display.
    Reserved,
    /// Picked up and out with the customer.
    Active,
    /// Active and past its end date. Derived at read time, never
    /// stored: the row keeps saying `active` until return or
    /// cancellation settles it.
    Overdue,
    /// Returned and settled. Terminal.
    Returned,
    /// Cancelled before return. Terminal.
    Cancelled,
}

impl RentalStatus {
    /// Statuses whose intervals block availability for other bookings.
    pub const fn blocks_availability(&self) -> bool {
        matches!(
            self,
            RentalStatus::Reserved | RentalStatus::Active | RentalStatus::Overdue
        )
    }

    /// Terminal statuses accept no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Returned | RentalStatus::Cancelled)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// How much of the rental's charges have been covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing paid; the whole balance is outstanding.
    Credit,
    /// Partly paid; some balance outstanding.
    Partial,
    /// Fully paid; no balance outstanding.
    Paid,
}

impl PaymentStatus {
    /// Derives the payment status from the running balances.
    pub fn from_balances(paid: Money, credit: Money) -> Self {
        if credit.is_zero() {
            PaymentStatus::Paid
        } else if paid.is_zero() {
            PaymentStatus::Credit
        } else {
            PaymentStatus::Partial
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Bank transfer.
    Transfer,
}

// =============================================================================
// Inventory Item
// =============================================================================

/// The status of a physical inventory item.
///
/// Mutated only by the booking ledger as bookings commit/release;
/// catalog management creates items (external).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// On the shelf, can be booked.
    Available,
    /// Out with a customer on an active rental.
    Rented,
    /// Being repaired/cleaned; never available for booking.
    Maintenance,
    /// Permanently withdrawn; never available for booking.
    Retired,
}

impl ItemStatus {
    /// Maintenance and retired items can never be booked, regardless of
    /// interval availability.
    pub const fn is_bookable(&self) -> bool {
        matches!(self, ItemStatus::Available | ItemStatus::Rented)
    }
}

/// A single physically trackable rentable unit (one camera, one dress),
/// distinct from the abstract product/catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalInventoryItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning product reference (catalog, external).
    pub product_id: String,

    /// Display name shown in conflict listings and agreements.
    pub name: String,

    /// Daily rate in cents, if this item rents daily.
    pub daily_rate_cents: Option<i64>,

    /// Weekly rate in cents, if this item rents weekly.
    pub weekly_rate_cents: Option<i64>,

    /// Monthly rate in cents, if this item rents monthly.
    pub monthly_rate_cents: Option<i64>,

    /// Current physical status.
    pub status: ItemStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RentalInventoryItem {
    /// Returns the configured rate for a rate type, if any.
    pub fn rate_for(&self, rate_type: RateType) -> Option<Money> {
        let cents = match rate_type {
            RateType::Daily => self.daily_rate_cents,
            RateType::Weekly => self.weekly_rate_cents,
            RateType::Monthly => self.monthly_rate_cents,
        };
        cents.map(Money::from_cents)
    }
}

// =============================================================================
// Return Condition
// =============================================================================

/// Condition of an item recorded at return time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    /// Returned in good shape.
    Good,
    /// Returned with declared damage.
    Damaged,
    /// Not returned at all.
    Lost,
}

/// One checklist field marked damaged on one item at return time.
///
/// Each entry carries its own independently non-negative repair fee;
/// the damage fee for the rental is the sum over all entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageEntry {
    /// The rental line item the damage belongs to.
    pub line_item_id: String,

    /// Which checklist field was marked damaged (lens, zipper, ...).
    pub checklist_field: String,

    /// Declared repair fee in cents. Must be non-negative.
    pub fee_cents: i64,

    /// Free-text notes from the return inspection.
    pub notes: Option<String>,
}

// =============================================================================
// Rental Line Item
// =============================================================================

/// One rented unit within a rental.
///
/// Uses the snapshot pattern: the item name and unit price are frozen at
/// booking time so the rental history stays consistent even if catalog
/// data changes later. Immutable once the rental is active, except for
/// the return-time condition fields and an explicit extend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalLineItem {
    pub id: String,
    pub rental_id: String,
    pub inventory_item_id: String,

    /// Item name at time of booking (frozen).
    pub name_snapshot: String,

    /// Billing unit for this line.
    pub rate_type: RateType,

    /// Unit price in cents at time of booking (frozen).
    pub unit_price_cents: i64,

    /// Positive count of rate units.
    pub duration: i64,

    /// Line total (unit_price × duration).
    pub line_total_cents: i64,

    /// Booking-time notes.
    pub notes: Option<String>,

    /// Condition recorded at return, if returned.
    pub condition_on_return: Option<ItemCondition>,

    /// Damage notes recorded at return.
    pub damage_notes: Option<String>,

    /// Damage fee attributed to this line at return.
    pub damage_fee_cents: i64,

    pub created_at: DateTime<Utc>,
}

impl RentalLineItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Rental
// =============================================================================

/// A rental aggregate: line items, payments, running balances.
///
/// ## Financial Invariant
/// After every settlement-affecting mutation:
/// `rental_price + late_fee + damage_fee + cleaning_fee == paid + credit`
/// (exact at cent granularity — see [`Rental::is_balanced`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rental {
    pub id: String,

    /// Human-readable business identifier (e.g. `RNT-260826-143255-0417`).
    pub rental_number: String,

    /// Customer reference (customer service, external).
    pub customer_id: String,

    /// Customer display name at booking time (frozen, for conflict
    /// listings without a join).
    pub customer_name: String,

    /// Branch reference.
    pub branch_id: String,

    /// First day of the rental (inclusive).
    pub start_date: NaiveDate,

    /// Last day of the rental (inclusive). Derived from the line items'
    /// implied durations; recomputed on every line change.
    pub end_date: NaiveDate,

    pub status: RentalStatus,
    pub payment_status: PaymentStatus,

    /// Sum of line totals.
    pub rental_price_cents: i64,

    /// Deposit taken at booking (counts towards paid_cents).
    pub deposit_cents: i64,

    /// Late fee computed at settlement.
    pub late_fee_cents: i64,

    /// Damage fee computed at settlement.
    pub damage_fee_cents: i64,

    /// Cleaning fee recorded at settlement.
    pub cleaning_fee_cents: i64,

    /// Running total of all recorded payments.
    pub paid_cents: i64,

    /// Outstanding balance collectible after return.
    pub credit_cents: i64,

    /// Deposit or held document securing the rental. Tracked, but not
    /// part of the settlement math.
    pub collateral: Option<String>,

    /// Reason recorded when cancelled.
    pub cancel_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Rental {
    /// Total charges: rental price plus all settlement fees.
    pub fn total_cost_cents(&self) -> i64 {
        self.rental_price_cents
            + self.late_fee_cents
            + self.damage_fee_cents
            + self.cleaning_fee_cents
    }

    /// Checks the financial invariant:
    /// `rental_price + late + damage + cleaning == paid + credit`.
    ///
    /// Amounts are integer cents, so the two-decimal tolerance from the
    /// business rule is exact equality here.
    pub fn is_balanced(&self) -> bool {
        self.total_cost_cents() == self.paid_cents + self.credit_cents
    }

    /// Returns the rental price as Money.
    #[inline]
    pub fn rental_price(&self) -> Money {
        Money::from_cents(self.rental_price_cents)
    }

    /// Returns the amount paid so far as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn credit(&self) -> Money {
        Money::from_cents(self.credit_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a rental.
///
/// Append-only: created by booking, settlement, or post-return top-up;
/// never mutated or deleted. Partial payments are separate records in
/// the same stream, not mutable running totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub rental_id: String,
    pub method: PaymentMethod,

    /// Amount paid in cents.
    pub amount_cents: i64,

    /// Free-text notes ("deposit", "return settlement", ...).
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
