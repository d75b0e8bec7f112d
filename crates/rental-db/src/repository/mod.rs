//! # Repository Module
//!
//! Database repository implementations for the rental core.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  BookingLedger                                                         │
//! │       │                                                                 │
//! │       │  db.rentals().get_by_id(&id)                                   │
//! │       ▼                                                                 │
//! │  RentalRepository                                                      │
//! │  ├── insert_rental(&self, rental, lines)                               │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── add_payment(&self, payment)                                       │
//! │  └── apply_settlement(&self, ...)                                      │
//! │       │                                                                 │
//! │       │  SQL (runtime-bound)                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place                                        │
//! │  • Easy to test against an in-memory database                          │
//! │  • Clean separation of concerns                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`item::ItemRepository`] - Inventory item reads and status updates
//! - [`rental::RentalRepository`] - Rental aggregate, line items, payments
//! - [`interval::IntervalRepository`] - Durable booking intervals

pub mod interval;
pub mod item;
pub mod rental;
