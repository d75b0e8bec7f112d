//! # rental-ledger: Booking & Settlement Service
//!
//! This crate orchestrates the rental lifecycle for one branch:
//! availability, booking, pickup, extension, cancellation, return
//! settlement, and debt collection.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Rental Core Architecture                            │
//! │                                                                         │
//! │  Transport layer (desktop app / HTTP handlers)                         │
//! │       │  DTOs (api.rs)                                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  rental-ledger (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────────┐   ┌───────────────┐   ┌───────────────┐  │   │
//! │  │   │ BookingLedger  │   │ Availability  │   │ Clock/Notify  │  │   │
//! │  │   │  (ledger.rs)   │──►│    Index      │   │  (seams for   │  │   │
//! │  │   │  orchestration │   │ (in-memory)   │   │ time & SMS)   │  │   │
//! │  │   └────────────────┘   └───────────────┘   └───────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │  pure math                │  persistence                        │
//! │       ▼                           ▼                                     │
//! │  rental-core                  rental-db                                 │
//! │  (rates, settlement, state)   (SQLite repositories)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`ledger`] - The [`BookingLedger`] orchestration service
//! - [`availability`] - In-memory per-item availability index
//! - [`api`] - Request/response DTOs
//! - [`config`] - Per-branch policy (late rate, number prefix)
//! - [`clock`] - Time source seam
//! - [`notify`] - Return receipt delivery seam
//! - [`error`] - Ledger error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rental_db::{Database, DbConfig};
//! use rental_ledger::{BookingLedger, LedgerConfig};
//!
//! let db = Database::new(DbConfig::new("./rental.db")).await?;
//! let ledger = BookingLedger::new(db, LedgerConfig::new("branch-1").daily_late_rate_cents(1500));
//! ledger.load().await?;
//!
//! let view = ledger.create_rental(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod availability;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;

// =============================================================================
// Re-exports
// =============================================================================

pub use availability::{AvailabilityIndex, BookingInterval, IntervalConflict};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::BookingLedger;
pub use notify::{Notifier, NullNotifier, ReceiptChannels};
