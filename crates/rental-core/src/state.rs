//! # Rental State Machine
//!
//! Legal status transitions and the operation gates derived from them.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Rental Lifecycle                                     │
//! │                                                                         │
//! │     reserved ──────► active ──────► returned                           │
//! │        │               │               ▲                               │
//! │        │               ▼               │                               │
//! │        │            overdue ───────────┘                               │
//! │        │               │                                               │
//! │        ▼               ▼                                               │
//! │    cancelled ◄──── cancelled                                           │
//! │                                                                         │
//! │  • active → overdue is DERIVED (today > end_date), never a stored      │
//! │    manual transition — see effective_status()                          │
//! │  • reserved → returned is disallowed (no same-day walk-in return)      │
//! │  • returned / cancelled are terminal                                   │
//! │                                                                         │
//! │  Any transition not listed is InvalidStateTransition, checked          │
//! │  BEFORE any side effect.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::types::RentalStatus;

/// Checks whether a stored-status transition is legal.
///
/// `Overdue` appears as a source (an overdue rental can be returned or
/// cancelled) but never as a target: it is derived at read time and
/// never stored.
pub fn can_transition(from: RentalStatus, to: RentalStatus) -> bool {
    use RentalStatus::*;
    matches!(
        (from, to),
        (Reserved, Active)
            | (Reserved, Cancelled)
            | (Active, Returned)
            | (Active, Cancelled)
            | (Overdue, Returned)
            | (Overdue, Cancelled)
    )
}

/// Rejects illegal transitions with `InvalidStateTransition`.
///
/// Callers invoke this before mutating anything, so a rejection has no
/// partial effects.
pub fn ensure_transition(from: RentalStatus, to: RentalStatus) -> CoreResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidStateTransition { from, to })
    }
}

/// Derives the read-time status: an active rental past its end date is
/// overdue.
///
/// This is a view-layer derivation, not a stored transition — the row
/// keeps saying `active` until return or cancellation settles it.
pub fn effective_status(stored: RentalStatus, end_date: NaiveDate, today: NaiveDate) -> RentalStatus {
    if stored == RentalStatus::Active && today > end_date {
        RentalStatus::Overdue
    } else {
        stored
    }
}

// =============================================================================
// Operation Gates
// =============================================================================

/// Cancellation is permitted from reserved, active, or overdue.
pub fn ensure_can_cancel(status: RentalStatus) -> CoreResult<()> {
    ensure_transition(status, RentalStatus::Cancelled)
}

/// Return is permitted from active or overdue only.
///
/// Reserved rentals were never picked up; cancel them instead.
pub fn ensure_can_return(status: RentalStatus) -> CoreResult<()> {
    ensure_transition(status, RentalStatus::Returned)
}

/// Activation (pickup) is permitted from reserved only.
pub fn ensure_can_activate(status: RentalStatus) -> CoreResult<()> {
    ensure_transition(status, RentalStatus::Active)
}

/// Extension is permitted while the rental is out: active or overdue.
pub fn ensure_can_extend(status: RentalStatus) -> CoreResult<()> {
    match status {
        RentalStatus::Active | RentalStatus::Overdue => Ok(()),
        other => Err(CoreError::InvalidStateTransition {
            from: other,
            to: other,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
