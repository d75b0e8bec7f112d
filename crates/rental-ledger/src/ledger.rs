//! # Booking Ledger
//!
//! Orchestrates the full rental lifecycle against the availability
//! index and the database.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BookingLedger                                    │
//! │                                                                         │
//! │  check_availability ──► AvailabilityIndex.query                        │
//! │                                                                         │
//! │  create_rental ──► price lines (rental-core rates)                     │
//! │                ──► AvailabilityIndex.reserve_all   (all-or-nothing)    │
//! │                ──► RentalRepository.insert_rental                      │
//! │                ──► IntervalRepository.insert        (durable form)     │
//! │                                                                         │
//! │  return_rental ──► settlement::settle              (pure math)         │
//! │                ──► RentalRepository.apply_settlement                   │
//! │                ──► release intervals + index                           │
//! │                ──► Notifier.rental_returned                            │
//! │                                                                         │
//! │  add_payment   ──► settlement::validate_top_up                         │
//! │                ──► RentalRepository.update_balances                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The availability index serializes conflicting reservations per item.
//! Everything that mutates an existing rental first takes that rental's
//! lock, so a return and an extension for the same rental can never
//! interleave. Operations on different rentals run in parallel.

use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::{
    AddPaymentRequest, AddPaymentResponse, BookingConflict, CheckAvailabilityRequest,
    CheckAvailabilityResponse, CreateRentalRequest, RentalLineRequest, RentalLineView,
    RentalView, ReturnItemInput, ReturnRentalRequest, SettlementView,
};
use crate::availability::{AvailabilityIndex, BookingInterval, IntervalConflict};
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::notify::{Notifier, NullNotifier, ReceiptChannels};
use rental_core::{
    rates, settlement, state, validation, CoreError, DamageEntry, ItemCondition, ItemStatus,
    Money, Payment, PaymentMethod, PaymentStatus, Rental, RentalInventoryItem, RentalLineItem,
    RentalStatus, SettlementInputs,
};
use rental_db::{Database, StoredInterval};

/// The booking and settlement service for one branch.
pub struct BookingLedger {
    db: Database,
    index: AvailabilityIndex,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    /// Per-rental locks so lifecycle mutations on one rental serialize.
    rental_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BookingLedger {
    /// Creates a ledger over the given database.
    ///
    /// Call [`BookingLedger::load`] before serving requests so the
    /// availability index reflects committed reservations.
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        BookingLedger {
            db,
            index: AvailabilityIndex::new(),
            config,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(NullNotifier),
            rental_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the clock (tests pin time with this).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the receipt notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Rebuilds the availability index from persisted intervals.
    pub async fn load(&self) -> LedgerResult<()> {
        let stored = self.db.intervals().load_all().await?;
        info!(intervals = stored.len(), "Rebuilding availability index");
        self.index.load(stored).await;
        Ok(())
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Checks whether every listed item is free for the date range.
    ///
    /// Advisory only: the answer can go stale the moment it is
    /// returned. [`BookingLedger::create_rental`] re-checks under the
    /// item locks before committing.
    pub async fn check_availability(
        &self,
        req: CheckAvailabilityRequest,
    ) -> LedgerResult<CheckAvailabilityResponse> {
        validation::validate_date_range(req.start_date, req.end_date)
            .map_err(CoreError::from)?;

        let mut conflicts = Vec::new();
        let mut out_of_service = Vec::new();
        for item_id in &req.inventory_item_ids {
            let item = self
                .db
                .items()
                .get_by_id(item_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Inventory item", item_id))?;
            if !item.status.is_bookable() {
                out_of_service.push(item_id.clone());
                continue;
            }
            for winner in self.index.query(item_id, req.start_date, req.end_date).await {
                conflicts.push(BookingConflict {
                    inventory_item_id: item_id.clone(),
                    rental_number: winner.rental_number,
                    customer_name: winner.customer_name,
                    start_date: winner.start_date,
                    end_date: winner.end_date,
                });
            }
        }

        Ok(CheckAvailabilityResponse {
            available: conflicts.is_empty() && out_of_service.is_empty(),
            conflicts,
            out_of_service,
        })
    }

    /// Product-level availability: "is any unit of this product free
    /// for those dates?". Available when at least one bookable unit
    /// has no overlapping interval; conflicts list the winners on
    /// every busy unit.
    pub async fn check_product_availability(
        &self,
        product_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<CheckAvailabilityResponse> {
        validation::validate_date_range(start_date, end_date).map_err(CoreError::from)?;

        let units = self.db.items().list_by_product(product_id).await?;
        if units.is_empty() {
            return Err(LedgerError::not_found("Product", product_id));
        }

        let mut conflicts = Vec::new();
        let mut out_of_service = Vec::new();
        let mut free_units = 0usize;
        for unit in &units {
            if !unit.status.is_bookable() {
                out_of_service.push(unit.id.clone());
                continue;
            }
            let winners = self.index.query(&unit.id, start_date, end_date).await;
            if winners.is_empty() {
                free_units += 1;
            }
            for winner in winners {
                conflicts.push(BookingConflict {
                    inventory_item_id: unit.id.clone(),
                    rental_number: winner.rental_number,
                    customer_name: winner.customer_name,
                    start_date: winner.start_date,
                    end_date: winner.end_date,
                });
            }
        }

        Ok(CheckAvailabilityResponse {
            available: free_units > 0,
            conflicts,
            out_of_service,
        })
    }

    // =========================================================================
    // Booking
    // =========================================================================

    /// Books a rental: prices the lines, reserves every item
    /// all-or-nothing, persists the aggregate, and records the opening
    /// deposit.
    pub async fn create_rental(&self, req: CreateRentalRequest) -> LedgerResult<RentalView> {
        debug!(
            customer = %req.customer_name,
            lines = req.lines.len(),
            start_date = %req.start_date,
            "Creating rental"
        );

        validation::validate_rental_lines(req.lines.len()).map_err(CoreError::from)?;
        validation::validate_fee_cents("deposit", req.deposit_cents).map_err(CoreError::from)?;
        if let Some(collateral) = &req.collateral {
            validation::validate_notes(collateral).map_err(CoreError::from)?;
        }
        for line_req in &req.lines {
            validation::validate_duration(line_req.duration).map_err(CoreError::from)?;
        }

        // The end date follows from durations alone, and product lines
        // need the full range before a unit can be picked for them.
        let max_days = req
            .lines
            .iter()
            .map(|l| rates::implied_days(l.rate_type, l.duration))
            .max()
            .ok_or(CoreError::EmptyRental)?;
        let end_date = req.start_date + Duration::days(max_days);

        let rental_id = Uuid::new_v4().to_string();
        let rental_number = self.generate_rental_number();
        let now = Utc::now();

        // Price every line. Name and unit price are frozen onto the
        // line from here on; a caller-supplied override beats the
        // catalog rate.
        let mut lines: Vec<RentalLineItem> = Vec::with_capacity(req.lines.len());
        let mut item_ids: Vec<String> = Vec::with_capacity(req.lines.len());
        for line_req in &req.lines {
            let item = self
                .resolve_line_item(line_req, req.start_date, end_date, &item_ids)
                .await?;

            if !item.status.is_bookable() {
                return Err(LedgerError::InvalidState(format!(
                    "item '{}' cannot be booked (status {:?})",
                    item.name, item.status
                )));
            }

            let unit_price = match line_req.unit_price_cents {
                Some(cents) => {
                    validation::validate_unit_price(cents).map_err(CoreError::from)?;
                    Money::from_cents(cents)
                }
                None => item.rate_for(line_req.rate_type).ok_or_else(|| {
                    LedgerError::InvalidInput(format!(
                        "item '{}' has no {:?} rate configured",
                        item.name, line_req.rate_type
                    ))
                })?,
            };

            let total = rates::line_total(line_req.rate_type, unit_price, line_req.duration)?;

            item_ids.push(item.id.clone());
            lines.push(RentalLineItem {
                id: Uuid::new_v4().to_string(),
                rental_id: rental_id.clone(),
                inventory_item_id: item.id,
                name_snapshot: item.name,
                rate_type: line_req.rate_type,
                unit_price_cents: unit_price.cents(),
                duration: line_req.duration,
                line_total_cents: total.cents(),
                notes: line_req.notes.clone(),
                condition_on_return: None,
                damage_notes: None,
                damage_fee_cents: 0,
                created_at: now,
            });
        }

        {
            let mut deduped = item_ids.clone();
            deduped.sort();
            deduped.dedup();
            if deduped.len() != item_ids.len() {
                return Err(LedgerError::InvalidInput(
                    "the same item appears on more than one line".to_string(),
                ));
            }
        }

        let rental_price = rates::rental_price(&lines);
        // Recomputed from the frozen lines; matches the upfront figure
        // since every line made it through resolution.
        let end_date =
            rates::rental_end_date(req.start_date, &lines).ok_or(CoreError::EmptyRental)?;

        if req.deposit_cents > rental_price.cents() {
            return Err(CoreError::PaymentExceedsBalance {
                requested: req.deposit_cents,
                outstanding: rental_price.cents(),
            }
            .into());
        }

        let paid = Money::from_cents(req.deposit_cents);
        let credit = rental_price - paid;

        // All-or-nothing reservation under the item locks. This is the
        // authoritative conflict check.
        let interval = BookingInterval {
            rental_id: rental_id.clone(),
            rental_number: rental_number.clone(),
            customer_name: req.customer_name.clone(),
            start_date: req.start_date,
            end_date,
        };
        if let Err(conflicts) = self.index.reserve_all(&item_ids, &interval).await {
            warn!(rental_number = %rental_number, conflicts = conflicts.len(), "Booking denied");
            return Err(conflict_error(conflicts));
        }

        let status = if req.pickup_now {
            RentalStatus::Active
        } else {
            RentalStatus::Reserved
        };
        let rental = Rental {
            id: rental_id.clone(),
            rental_number: rental_number.clone(),
            customer_id: req.customer_id,
            customer_name: req.customer_name,
            branch_id: self.config.branch_id.clone(),
            start_date: req.start_date,
            end_date,
            status,
            payment_status: PaymentStatus::from_balances(paid, credit),
            rental_price_cents: rental_price.cents(),
            deposit_cents: req.deposit_cents,
            late_fee_cents: 0,
            damage_fee_cents: 0,
            cleaning_fee_cents: 0,
            paid_cents: paid.cents(),
            credit_cents: credit.cents(),
            collateral: req.collateral,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            returned_at: None,
        };

        if let Err(err) = self.db.rentals().insert_rental(&rental, &lines).await {
            self.index.release_rental(&rental_id).await;
            return Err(err.into());
        }

        for item_id in &item_ids {
            let stored = StoredInterval {
                inventory_item_id: item_id.clone(),
                rental_id: rental_id.clone(),
                rental_number: rental_number.clone(),
                customer_name: rental.customer_name.clone(),
                start_date: req.start_date,
                end_date,
            };
            if let Err(err) = self.db.intervals().insert(&stored).await {
                if let Err(cleanup) = self.db.intervals().delete_for_rental(&rental_id).await {
                    warn!(rental_id = %rental_id, error = %cleanup, "Interval rollback failed");
                }
                self.index.release_rental(&rental_id).await;
                return Err(err.into());
            }
        }

        if req.deposit_cents > 0 {
            self.record_payment(
                &rental_id,
                req.deposit_cents,
                req.deposit_method.unwrap_or(PaymentMethod::Cash),
                Some("deposit".to_string()),
            )
            .await?;
        }

        if req.pickup_now {
            self.mark_items(&item_ids, ItemStatus::Rented).await?;
        }

        info!(
            rental_number = %rental_number,
            items = item_ids.len(),
            price = rental_price.cents(),
            deposit = req.deposit_cents,
            pickup_now = req.pickup_now,
            "Rental created"
        );

        Ok(self.view(&rental, &lines))
    }

    /// Hands the items over on a reserved rental (reserved → active).
    pub async fn activate_rental(&self, rental_id: &str) -> LedgerResult<RentalView> {
        let lock = self.rental_lock(rental_id).await;
        let guard = lock.lock().await;
        let result = self.apply_activation(rental_id).await;
        drop(guard);
        drop(lock);
        self.discard_rental_lock(rental_id).await;
        result
    }

    /// Body of [`BookingLedger::activate_rental`], run under the
    /// per-rental lock.
    async fn apply_activation(&self, rental_id: &str) -> LedgerResult<RentalView> {
        let rental = self.fetch_rental(rental_id).await?;
        state::ensure_can_activate(rental.status)?;

        self.db
            .rentals()
            .update_status(rental_id, RentalStatus::Active)
            .await?;

        let lines = self.db.rentals().get_items(rental_id).await?;
        let item_ids: Vec<String> =
            lines.iter().map(|l| l.inventory_item_id.clone()).collect();
        self.mark_items(&item_ids, ItemStatus::Rented).await?;

        info!(rental_number = %rental.rental_number, "Rental activated");

        let rental = Rental {
            status: RentalStatus::Active,
            ..rental
        };
        Ok(self.view(&rental, &lines))
    }

    /// Widens a rental's end date, denying the extension if any item is
    /// already promised to someone else inside the widened window.
    ///
    /// Date-only: the price agreed at booking stands. Time past the new
    /// end date still accrues late fees as usual.
    pub async fn extend_rental(
        &self,
        rental_id: &str,
        new_end_date: NaiveDate,
    ) -> LedgerResult<RentalView> {
        let lock = self.rental_lock(rental_id).await;
        let guard = lock.lock().await;
        let result = self.apply_extension(rental_id, new_end_date).await;
        drop(guard);
        drop(lock);
        self.discard_rental_lock(rental_id).await;
        result
    }

    /// Body of [`BookingLedger::extend_rental`], run under the
    /// per-rental lock.
    async fn apply_extension(
        &self,
        rental_id: &str,
        new_end_date: NaiveDate,
    ) -> LedgerResult<RentalView> {
        let rental = self.fetch_rental(rental_id).await?;
        let today = self.clock.today();
        let status = state::effective_status(rental.status, rental.end_date, today);
        state::ensure_can_extend(status)?;

        if new_end_date <= rental.end_date {
            return Err(LedgerError::InvalidInput(format!(
                "new end date {new_end_date} is not after the current end date {}",
                rental.end_date
            )));
        }

        if let Err(conflicts) = self.index.extend(rental_id, new_end_date).await {
            return Err(conflict_error(conflicts));
        }

        self.db
            .rentals()
            .update_end_date(rental_id, new_end_date)
            .await?;
        self.db
            .intervals()
            .update_end_date(rental_id, new_end_date)
            .await?;

        info!(
            rental_number = %rental.rental_number,
            new_end_date = %new_end_date,
            "Rental extended"
        );

        let lines = self.db.rentals().get_items(rental_id).await?;
        let rental = Rental {
            end_date: new_end_date,
            ..rental
        };
        Ok(self.view(&rental, &lines))
    }

    /// Cancels a rental and frees its items immediately.
    ///
    /// Payments already recorded stay on the books; refunds are an
    /// accounting decision, not a ledger one.
    pub async fn cancel_rental(&self, rental_id: &str, reason: &str) -> LedgerResult<RentalView> {
        let lock = self.rental_lock(rental_id).await;
        let guard = lock.lock().await;
        let result = self.apply_cancellation(rental_id, reason).await;
        drop(guard);
        drop(lock);
        self.discard_rental_lock(rental_id).await;
        result
    }

    /// Body of [`BookingLedger::cancel_rental`], run under the
    /// per-rental lock.
    async fn apply_cancellation(&self, rental_id: &str, reason: &str) -> LedgerResult<RentalView> {
        let rental = self.fetch_rental(rental_id).await?;
        let today = self.clock.today();
        let status = state::effective_status(rental.status, rental.end_date, today);
        state::ensure_can_cancel(status)?;

        self.db.rentals().set_cancelled(rental_id, reason).await?;
        self.db.intervals().delete_for_rental(rental_id).await?;
        self.index.release_rental(rental_id).await;

        let lines = self.db.rentals().get_items(rental_id).await?;
        if matches!(status, RentalStatus::Active | RentalStatus::Overdue) {
            // Items were out with the customer and just came back.
            let item_ids: Vec<String> =
                lines.iter().map(|l| l.inventory_item_id.clone()).collect();
            self.mark_items(&item_ids, ItemStatus::Available).await?;
        }

        info!(rental_number = %rental.rental_number, reason = %reason, "Rental cancelled");

        let rental = Rental {
            status: RentalStatus::Cancelled,
            cancel_reason: Some(reason.to_string()),
            ..rental
        };
        Ok(self.view(&rental, &lines))
    }

    // =========================================================================
    // Return / settlement
    // =========================================================================

    /// Returns a rental: records per-item inspection results, computes
    /// the settlement, reconciles the payment, and frees the items.
    pub async fn return_rental(&self, req: ReturnRentalRequest) -> LedgerResult<SettlementView> {
        debug!(rental_id = %req.rental_id, items = req.items.len(), "Processing return");

        let lock = self.rental_lock(&req.rental_id).await;
        let guard = lock.lock().await;
        let result = self.settle_return(&req).await;
        drop(guard);
        drop(lock);
        self.discard_rental_lock(&req.rental_id).await;
        result
    }

    /// Body of [`BookingLedger::return_rental`], run under the
    /// per-rental lock.
    async fn settle_return(&self, req: &ReturnRentalRequest) -> LedgerResult<SettlementView> {
        let rental = self.fetch_rental(&req.rental_id).await?;
        let today = self.clock.today();
        let status = state::effective_status(rental.status, rental.end_date, today);
        state::ensure_can_return(status)?;

        let return_date = req.return_date.unwrap_or(today);
        validation::validate_fee_cents("cleaning_fee", req.cleaning_fee_cents)
            .map_err(CoreError::from)?;

        let lines = self.db.rentals().get_items(&req.rental_id).await?;
        let inspections = match_inspections(&lines, &req.items)?;

        let mut damage_entries: Vec<DamageEntry> = Vec::new();
        for input in &req.items {
            for field in &input.damage {
                damage_entries.push(DamageEntry {
                    line_item_id: input.line_item_id.clone(),
                    checklist_field: field.field.clone(),
                    fee_cents: field.fee_cents,
                    notes: field.notes.clone(),
                });
            }
        }

        let result = settlement::settle(SettlementInputs {
            rental_price: rental.rental_price(),
            paid_so_far: rental.paid(),
            expected_end_date: rental.end_date,
            actual_return_date: return_date,
            daily_late_rate: self.config.daily_late_rate(),
            damage_entries: &damage_entries,
            needs_cleaning: req.needs_cleaning,
            cleaning_amount: Money::from_cents(req.cleaning_fee_cents),
            payment_type: req.payment_type,
            payment_amount: Money::from_cents(req.payment_amount_cents),
        })
        .map_err(|err| {
            if matches!(err, CoreError::SettlementImbalance { .. }) {
                error!(
                    rental_number = %rental.rental_number,
                    error = %err,
                    "Settlement invariant violated"
                );
            }
            LedgerError::from(err)
        })?;

        for input in &req.items {
            let fee: i64 = input.damage.iter().map(|d| d.fee_cents).sum();
            let notes = join_damage_notes(&input.damage);
            self.db
                .rentals()
                .record_line_return(&input.line_item_id, input.condition, notes.as_deref(), fee)
                .await?;
        }

        self.db
            .rentals()
            .apply_settlement(&req.rental_id, &result, Utc::now())
            .await?;

        if result.payment_amount_cents > 0 {
            self.record_payment(
                &req.rental_id,
                result.payment_amount_cents,
                req.payment_method.unwrap_or(PaymentMethod::Cash),
                Some("return settlement".to_string()),
            )
            .await?;
        }

        self.db.intervals().delete_for_rental(&req.rental_id).await?;
        self.index.release_rental(&req.rental_id).await;

        // Damaged units go to the workshop, lost ones off the books.
        for (line, input) in &inspections {
            let new_status = match input.condition {
                ItemCondition::Good => ItemStatus::Available,
                ItemCondition::Damaged => ItemStatus::Maintenance,
                ItemCondition::Lost => ItemStatus::Retired,
            };
            self.db
                .items()
                .update_status(&line.inventory_item_id, new_status)
                .await?;
        }

        let view = SettlementView {
            rental_price_cents: rental.rental_price_cents,
            late_fee_cents: result.late_fee_cents,
            damage_fee_cents: result.damage_fee_cents,
            cleaning_fee_cents: result.cleaning_fee_cents,
            total_cost_cents: result.total_cost_cents,
            days_late: result.days_late,
            payment_amount_cents: result.payment_amount_cents,
            paid_cents: result.new_paid_cents,
            credit_cents: result.new_credit_cents,
            payment_status: result.payment_status,
        };

        info!(
            rental_number = %rental.rental_number,
            days_late = result.days_late,
            total = result.total_cost_cents,
            credit = result.new_credit_cents,
            "Rental returned and settled"
        );

        self.notifier.rental_returned(
            &rental.rental_number,
            &view,
            ReceiptChannels {
                sms: req.send_sms,
                telegram: req.send_telegram,
            },
        );

        Ok(view)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Collects money against the debt left by a partial or credit
    /// settlement. Post-return only: open rentals settle their balance
    /// at return time.
    pub async fn add_payment(&self, req: AddPaymentRequest) -> LedgerResult<AddPaymentResponse> {
        validation::validate_payment_amount(req.amount_cents).map_err(CoreError::from)?;

        let rental_id = req.rental_id.clone();
        let lock = self.rental_lock(&rental_id).await;
        let guard = lock.lock().await;
        let result = self.apply_top_up(req).await;
        drop(guard);
        drop(lock);
        self.discard_rental_lock(&rental_id).await;
        result
    }

    /// Body of [`BookingLedger::add_payment`], run under the
    /// per-rental lock.
    async fn apply_top_up(&self, req: AddPaymentRequest) -> LedgerResult<AddPaymentResponse> {
        let rental = self.fetch_rental(&req.rental_id).await?;
        if rental.status != RentalStatus::Returned {
            return Err(LedgerError::InvalidState(format!(
                "payments can only be collected on returned rentals (status {:?})",
                rental.status
            )));
        }

        let amount = Money::from_cents(req.amount_cents);
        settlement::validate_top_up(rental.credit(), amount)?;

        let new_paid = rental.paid() + amount;
        let new_credit = rental.credit() - amount;
        let payment_status = PaymentStatus::from_balances(new_paid, new_credit);

        self.db
            .rentals()
            .update_balances(
                &req.rental_id,
                new_paid.cents(),
                new_credit.cents(),
                payment_status,
            )
            .await?;
        self.record_payment(&req.rental_id, req.amount_cents, req.method, req.notes)
            .await?;

        info!(
            rental_number = %rental.rental_number,
            amount = req.amount_cents,
            remaining = new_credit.cents(),
            "Payment collected"
        );

        Ok(AddPaymentResponse {
            rental_id: req.rental_id,
            paid_cents: new_paid.cents(),
            credit_cents: new_credit.cents(),
            payment_status,
        })
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Loads a rental for display. The returned status is effective:
    /// an active rental past its end date reads as overdue.
    pub async fn get_rental(&self, rental_id: &str) -> LedgerResult<RentalView> {
        let rental = self.fetch_rental(rental_id).await?;
        let lines = self.db.rentals().get_items(rental_id).await?;
        Ok(self.view(&rental, &lines))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn fetch_rental(&self, rental_id: &str) -> LedgerResult<Rental> {
        self.db
            .rentals()
            .get_by_id(rental_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Rental", rental_id))
    }

    /// Resolves a line request to a concrete unit: the named item, or
    /// the first free bookable unit of the named product.
    ///
    /// `taken` holds units already claimed by earlier lines of the same
    /// request so two product lines never land on the same unit. The
    /// pick is advisory; [`AvailabilityIndex::reserve_all`] re-checks
    /// under the item locks before anything commits.
    async fn resolve_line_item(
        &self,
        line: &RentalLineRequest,
        start_date: NaiveDate,
        end_date: NaiveDate,
        taken: &[String],
    ) -> LedgerResult<RentalInventoryItem> {
        if let Some(item_id) = &line.inventory_item_id {
            return self
                .db
                .items()
                .get_by_id(item_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Inventory item", item_id));
        }

        let product_id = line.product_id.as_deref().ok_or_else(|| {
            LedgerError::InvalidInput(
                "each line needs an inventory item or a product".to_string(),
            )
        })?;

        let units = self.db.items().list_by_product(product_id).await?;
        if units.is_empty() {
            return Err(LedgerError::not_found("Product", product_id));
        }

        let mut conflicts = Vec::new();
        for unit in units {
            if !unit.status.is_bookable() || taken.contains(&unit.id) {
                continue;
            }
            let winners = self.index.query(&unit.id, start_date, end_date).await;
            if winners.is_empty() {
                return Ok(unit);
            }
            for winner in winners {
                conflicts.push(BookingConflict {
                    inventory_item_id: unit.id.clone(),
                    rental_number: winner.rental_number,
                    customer_name: winner.customer_name,
                    start_date: winner.start_date,
                    end_date: winner.end_date,
                });
            }
        }

        // Every unit is busy, out of service, or already on this rental.
        Err(LedgerError::Conflict { conflicts })
    }

    async fn record_payment(
        &self,
        rental_id: &str,
        amount_cents: i64,
        method: PaymentMethod,
        notes: Option<String>,
    ) -> LedgerResult<()> {
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            rental_id: rental_id.to_string(),
            method,
            amount_cents,
            notes,
            created_at: Utc::now(),
        };
        self.db.rentals().add_payment(&payment).await?;
        Ok(())
    }

    async fn mark_items(&self, item_ids: &[String], status: ItemStatus) -> LedgerResult<()> {
        for item_id in item_ids {
            self.db.items().update_status(item_id, status).await?;
        }
        Ok(())
    }

    async fn rental_lock(&self, rental_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.rental_locks.lock().await;
        Arc::clone(
            locks
                .entry(rental_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drops a rental's idle lock entry so the map does not grow
    /// forever. Called after every locked operation: an operation
    /// still waiting on the lock holds its own clone, which keeps the
    /// entry alive until that operation's own discard. Removing an
    /// idle entry is always safe since the next operation recreates
    /// it on demand.
    async fn discard_rental_lock(&self, rental_id: &str) {
        let mut locks = self.rental_locks.lock().await;
        if locks
            .get(rental_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(rental_id);
        }
    }

    #[cfg(test)]
    async fn rental_lock_count(&self) -> usize {
        self.rental_locks.lock().await.len()
    }

    fn view(&self, rental: &Rental, lines: &[RentalLineItem]) -> RentalView {
        let today = self.clock.today();
        RentalView {
            rental_id: rental.id.clone(),
            rental_number: rental.rental_number.clone(),
            customer_id: rental.customer_id.clone(),
            customer_name: rental.customer_name.clone(),
            start_date: rental.start_date,
            end_date: rental.end_date,
            status: state::effective_status(rental.status, rental.end_date, today),
            payment_status: rental.payment_status,
            rental_price_cents: rental.rental_price_cents,
            late_fee_cents: rental.late_fee_cents,
            damage_fee_cents: rental.damage_fee_cents,
            cleaning_fee_cents: rental.cleaning_fee_cents,
            total_cost_cents: rental.total_cost_cents(),
            paid_cents: rental.paid_cents,
            credit_cents: rental.credit_cents,
            collateral: rental.collateral.clone(),
            lines: lines
                .iter()
                .map(|line| RentalLineView {
                    line_item_id: line.id.clone(),
                    inventory_item_id: line.inventory_item_id.clone(),
                    name: line.name_snapshot.clone(),
                    rate_type: line.rate_type,
                    unit_price_cents: line.unit_price_cents,
                    duration: line.duration,
                    line_total_cents: line.line_total_cents,
                    condition_on_return: line.condition_on_return,
                    damage_fee_cents: line.damage_fee_cents,
                })
                .collect(),
        }
    }

    /// Generates a human-readable rental number: prefix, timestamp, and
    /// a sub-second discriminator against same-second bookings.
    fn generate_rental_number(&self) -> String {
        let now = Utc::now();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        let random: u16 = (nanos % 10000) as u16;
        format!(
            "{}-{}-{:04}",
            self.config.rental_number_prefix,
            now.format("%y%m%d-%H%M%S"),
            random
        )
    }
}

/// Pairs every rental line with its inspection input, rejecting unknown
/// or missing line items. Every line must be inspected at return.
fn match_inspections<'a>(
    lines: &'a [RentalLineItem],
    items: &'a [ReturnItemInput],
) -> LedgerResult<Vec<(&'a RentalLineItem, &'a ReturnItemInput)>> {
    let by_id: HashMap<&str, &RentalLineItem> =
        lines.iter().map(|l| (l.id.as_str(), l)).collect();

    for input in items {
        if !by_id.contains_key(input.line_item_id.as_str()) {
            return Err(LedgerError::InvalidInput(format!(
                "unknown line item: {}",
                input.line_item_id
            )));
        }
    }

    let mut paired = Vec::with_capacity(lines.len());
    for line in lines {
        let input = items
            .iter()
            .find(|i| i.line_item_id == line.id)
            .ok_or_else(|| {
                LedgerError::InvalidInput(format!(
                    "line item '{}' was not inspected",
                    line.name_snapshot
                ))
            })?;
        paired.push((line, input));
    }

    Ok(paired)
}

fn join_damage_notes(damage: &[crate::api::DamageFieldInput]) -> Option<String> {
    let parts: Vec<String> = damage
        .iter()
        .map(|d| match &d.notes {
            Some(notes) => format!("{}: {}", d.field, notes),
            None => d.field.clone(),
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn conflict_error(conflicts: Vec<IntervalConflict>) -> LedgerError {
    LedgerError::Conflict {
        conflicts: conflicts
            .into_iter()
            .map(|c| BookingConflict {
                inventory_item_id: c.inventory_item_id,
                rental_number: c.winner.rental_number,
                customer_name: c.winner.customer_name,
                start_date: c.winner.start_date,
                end_date: c.winner.end_date,
            })
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DamageFieldInput, RentalLineRequest};
    use rental_core::{RateType, SettlementPaymentType};
    use rental_db::DbConfig;

    /// Clock the test can move forward mid-scenario.
    struct TestClock(std::sync::Mutex<NaiveDate>);

    impl TestClock {
        fn starting(date: NaiveDate) -> Arc<Self> {
            Arc::new(TestClock(std::sync::Mutex::new(date)))
        }

        fn set(&self, date: NaiveDate) {
            *self.0.lock().unwrap() = date;
        }
    }

    impl Clock for TestClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Ledger over an in-memory database, late rate 15.00/day, clock
    /// pinned to June 1 2026.
    async fn setup() -> (BookingLedger, Arc<TestClock>, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = TestClock::starting(date(2026, 6, 1));
        let config = LedgerConfig::new("branch-1").daily_late_rate_cents(1500);
        let ledger = BookingLedger::new(db.clone(), config).with_clock(clock.clone());
        ledger.load().await.unwrap();
        (ledger, clock, db)
    }

    async fn seed_item(db: &Database, name: &str, daily_rate_cents: i64) -> String {
        let now = Utc::now();
        let item = rental_core::RentalInventoryItem {
            id: Uuid::new_v4().to_string(),
            product_id: "prod-1".to_string(),
            name: name.to_string(),
            daily_rate_cents: Some(daily_rate_cents),
            weekly_rate_cents: Some(daily_rate_cents * 6),
            monthly_rate_cents: None,
            status: ItemStatus::Available,
            created_at: now,
            updated_at: now,
        };
        db.items().insert(&item).await.unwrap();
        item.id
    }

    fn daily_line(item_id: &str, duration: i64) -> RentalLineRequest {
        RentalLineRequest {
            inventory_item_id: Some(item_id.to_string()),
            product_id: None,
            rate_type: RateType::Daily,
            duration,
            unit_price_cents: None,
            notes: None,
        }
    }

    fn booking(item_id: &str, duration: i64, start: NaiveDate, pickup_now: bool) -> CreateRentalRequest {
        CreateRentalRequest {
            customer_id: "cust-1".to_string(),
            customer_name: "Alice".to_string(),
            start_date: start,
            lines: vec![daily_line(item_id, duration)],
            deposit_cents: 0,
            deposit_method: None,
            pickup_now,
            collateral: None,
        }
    }

    fn product_booking(product_id: &str, duration: i64, start: NaiveDate) -> CreateRentalRequest {
        let mut req = booking("", duration, start, true);
        req.lines[0].inventory_item_id = None;
        req.lines[0].product_id = Some(product_id.to_string());
        req
    }

    fn good_return(rental: &RentalView, payment_type: SettlementPaymentType, amount: i64) -> ReturnRentalRequest {
        ReturnRentalRequest {
            rental_id: rental.rental_id.clone(),
            return_date: None,
            items: rental
                .lines
                .iter()
                .map(|l| ReturnItemInput {
                    line_item_id: l.line_item_id.clone(),
                    condition: ItemCondition::Good,
                    damage: Vec::new(),
                })
                .collect(),
            needs_cleaning: false,
            cleaning_fee_cents: 0,
            payment_type,
            payment_amount_cents: amount,
            payment_method: Some(PaymentMethod::Cash),
            send_sms: false,
            send_telegram: false,
        }
    }

    async fn assert_balanced(db: &Database, rental_id: &str) {
        let rental = db.rentals().get_by_id(rental_id).await.unwrap().unwrap();
        assert!(
            rental.is_balanced(),
            "price + fees must equal paid + credit for {rental_id}"
        );
    }

    #[tokio::test]
    async fn test_overlapping_booking_names_the_winner() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Tent", 2500).await;

        let first = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();
        assert_eq!(first.end_date, date(2026, 6, 5));

        let mut second = booking(&item_id, 6, date(2026, 6, 4), true);
        second.customer_name = "Bob".to_string();
        let err = ledger.create_rental(second).await.unwrap_err();

        match err {
            LedgerError::Conflict { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].rental_number, first.rental_number);
                assert_eq!(conflicts[0].customer_name, "Alice");
                assert_eq!(conflicts[0].end_date, date(2026, 6, 5));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }

        // The advisory check agrees
        let check = ledger
            .check_availability(CheckAvailabilityRequest {
                inventory_item_ids: vec![item_id.clone()],
                start_date: date(2026, 6, 5),
                end_date: date(2026, 6, 7),
            })
            .await
            .unwrap();
        assert!(!check.available);

        let check = ledger
            .check_availability(CheckAvailabilityRequest {
                inventory_item_ids: vec![item_id],
                start_date: date(2026, 6, 6),
                end_date: date(2026, 6, 8),
            })
            .await
            .unwrap();
        assert!(check.available);
    }

    #[tokio::test]
    async fn test_late_damaged_partial_settlement() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;

        // 4 days at 25.00 → price 100.00, due back June 5
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();
        assert_eq!(rental.rental_price_cents, 10000);

        // Returned June 8: 3 days late at 15.00/day, lens damage 20.00
        clock.set(date(2026, 6, 8));
        let mut req = good_return(&rental, SettlementPaymentType::Partial, 10000);
        req.items[0].condition = ItemCondition::Damaged;
        req.items[0].damage = vec![DamageFieldInput {
            field: "lens".to_string(),
            fee_cents: 2000,
            notes: Some("scratched".to_string()),
        }];

        let settlement = ledger.return_rental(req).await.unwrap();
        assert_eq!(settlement.days_late, 3);
        assert_eq!(settlement.late_fee_cents, 4500);
        assert_eq!(settlement.damage_fee_cents, 2000);
        assert_eq!(settlement.total_cost_cents, 16500);
        assert_eq!(settlement.paid_cents, 10000);
        assert_eq!(settlement.credit_cents, 6500);
        assert_eq!(settlement.payment_status, PaymentStatus::Partial);
        assert_balanced(&db, &rental.rental_id).await;

        // Damaged unit goes to the workshop
        let item = db.items().get_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Maintenance);

        let lines = db.rentals().get_items(&rental.rental_id).await.unwrap();
        assert_eq!(lines[0].condition_on_return, Some(ItemCondition::Damaged));
        assert_eq!(lines[0].damage_notes.as_deref(), Some("lens: scratched"));
    }

    #[tokio::test]
    async fn test_full_settlement_clears_the_account() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;

        let mut req = booking(&item_id, 4, date(2026, 6, 1), true);
        req.deposit_cents = 4000;
        req.deposit_method = Some(PaymentMethod::Card);
        let rental = ledger.create_rental(req).await.unwrap();
        assert_eq!(rental.paid_cents, 4000);
        assert_eq!(rental.credit_cents, 6000);
        assert_balanced(&db, &rental.rental_id).await;

        // On-time return, pay everything. The supplied amount is
        // ignored for full settlements; the remaining 60.00 is taken.
        clock.set(date(2026, 6, 5));
        let settlement = ledger
            .return_rental(good_return(&rental, SettlementPaymentType::Full, 1))
            .await
            .unwrap();
        assert_eq!(settlement.days_late, 0);
        assert_eq!(settlement.payment_amount_cents, 6000);
        assert_eq!(settlement.paid_cents, 10000);
        assert_eq!(settlement.credit_cents, 0);
        assert_eq!(settlement.payment_status, PaymentStatus::Paid);
        assert_balanced(&db, &rental.rental_id).await;

        // Deposit + settlement payment both on the books
        let total = db.rentals().get_total_paid(&rental.rental_id).await.unwrap();
        assert_eq!(total, 10000);

        let item = db.items().get_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_top_up_collects_outstanding_debt() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        // Credit settlement: entire 100.00 becomes debt
        clock.set(date(2026, 6, 5));
        let settlement = ledger
            .return_rental(good_return(&rental, SettlementPaymentType::Credit, 0))
            .await
            .unwrap();
        assert_eq!(settlement.credit_cents, 10000);
        assert_eq!(settlement.payment_status, PaymentStatus::Credit);

        // Customer comes back and pays 40.00, then the rest
        let resp = ledger
            .add_payment(AddPaymentRequest {
                rental_id: rental.rental_id.clone(),
                amount_cents: 4000,
                method: PaymentMethod::Cash,
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.credit_cents, 6000);
        assert_eq!(resp.payment_status, PaymentStatus::Partial);
        assert_balanced(&db, &rental.rental_id).await;

        // Overpayment is rejected before any mutation
        let err = ledger
            .add_payment(AddPaymentRequest {
                rental_id: rental.rental_id.clone(),
                amount_cents: 99999,
                method: PaymentMethod::Cash,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert_balanced(&db, &rental.rental_id).await;

        // So is a zero amount, before the rental is even loaded
        let err = ledger
            .add_payment(AddPaymentRequest {
                rental_id: rental.rental_id.clone(),
                amount_cents: 0,
                method: PaymentMethod::Cash,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        let resp = ledger
            .add_payment(AddPaymentRequest {
                rental_id: rental.rental_id.clone(),
                amount_cents: 6000,
                method: PaymentMethod::Transfer,
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.credit_cents, 0);
        assert_eq!(resp.payment_status, PaymentStatus::Paid);
        assert_balanced(&db, &rental.rental_id).await;

        // Nothing left to collect
        let err = ledger
            .add_payment(AddPaymentRequest {
                rental_id: rental.rental_id.clone(),
                amount_cents: 100,
                method: PaymentMethod::Cash,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // Open rentals settle at return, not through top-ups
        let rental2 = ledger
            .create_rental(booking(&seed_item(&db, "Tripod", 1000).await, 2, date(2026, 6, 10), true))
            .await
            .unwrap();
        let err = ledger
            .add_payment(AddPaymentRequest {
                rental_id: rental2.rental_id.clone(),
                amount_cents: 500,
                method: PaymentMethod::Cash,
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_terminal_states_reject_lifecycle_operations() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        clock.set(date(2026, 6, 5));
        ledger
            .return_rental(good_return(&rental, SettlementPaymentType::Full, 0))
            .await
            .unwrap();

        // Cancel after return is a state error
        let err = ledger
            .cancel_rental(&rental.rental_id, "changed mind")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));

        // So is a second return
        let err = ledger
            .return_rental(good_return(&rental, SettlementPaymentType::Full, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_terminal_rentals_release_their_locks() {
        let (ledger, clock, db) = setup().await;
        let item_a = seed_item(&db, "Camera", 2500).await;
        let item_b = seed_item(&db, "Tripod", 1000).await;

        let returned = ledger
            .create_rental(booking(&item_a, 4, date(2026, 6, 1), true))
            .await
            .unwrap();
        let cancelled = ledger
            .create_rental(booking(&item_b, 4, date(2026, 6, 1), false))
            .await
            .unwrap();

        clock.set(date(2026, 6, 5));
        ledger
            .return_rental(good_return(&returned, SettlementPaymentType::Full, 0))
            .await
            .unwrap();
        ledger
            .cancel_rental(&cancelled.rental_id, "no-show")
            .await
            .unwrap();

        assert_eq!(ledger.rental_lock_count().await, 0);

        // A rejected operation leaves nothing behind either
        let err = ledger
            .return_rental(good_return(&returned, SettlementPaymentType::Full, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
        assert_eq!(ledger.rental_lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_reserved_rental_blocks_and_activates() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Projector", 4000).await;

        // Future pickup: reserved, items stay available on the shelf
        let rental = ledger
            .create_rental(booking(&item_id, 3, date(2026, 6, 10), false))
            .await
            .unwrap();
        assert_eq!(rental.status, RentalStatus::Reserved);
        let item = db.items().get_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Available);

        // But the dates are blocked for everyone else
        let err = ledger
            .create_rental(booking(&item_id, 2, date(2026, 6, 11), false))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));

        // Pickup day: hand over
        let activated = ledger.activate_rental(&rental.rental_id).await.unwrap();
        assert_eq!(activated.status, RentalStatus::Active);
        let item = db.items().get_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Rented);

        // Double activation is a state error
        let err = ledger.activate_rental(&rental.rental_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_cancel_reserved_frees_the_dates() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Projector", 4000).await;
        let rental = ledger
            .create_rental(booking(&item_id, 3, date(2026, 6, 10), false))
            .await
            .unwrap();

        let cancelled = ledger
            .cancel_rental(&rental.rental_id, "customer no-show")
            .await
            .unwrap();
        assert_eq!(cancelled.status, RentalStatus::Cancelled);

        // Same dates book cleanly now
        ledger
            .create_rental(booking(&item_id, 3, date(2026, 6, 10), false))
            .await
            .unwrap();

        let stored = db.rentals().get_by_id(&rental.rental_id).await.unwrap().unwrap();
        assert_eq!(stored.cancel_reason.as_deref(), Some("customer no-show"));
    }

    #[tokio::test]
    async fn test_extension_widens_until_the_next_booking() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;

        let first = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();
        let second = ledger
            .create_rental(booking(&item_id, 2, date(2026, 6, 10), false))
            .await
            .unwrap();
        assert_eq!(second.status, RentalStatus::Reserved);

        // June 8 is clear
        let extended = ledger
            .extend_rental(&first.rental_id, date(2026, 6, 8))
            .await
            .unwrap();
        assert_eq!(extended.end_date, date(2026, 6, 8));

        // June 10 belongs to the reservation
        let err = ledger
            .extend_rental(&first.rental_id, date(2026, 6, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));

        // Shrinking is not extending
        let err = ledger
            .extend_rental(&first.rental_id, date(2026, 6, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // The durable form follows the index
        let intervals = db.intervals().load_all().await.unwrap();
        let own = intervals
            .iter()
            .find(|i| i.rental_id == first.rental_id)
            .unwrap();
        assert_eq!(own.end_date, date(2026, 6, 8));
    }

    #[tokio::test]
    async fn test_overdue_is_derived_not_stored() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        clock.set(date(2026, 6, 9));
        let view = ledger.get_rental(&rental.rental_id).await.unwrap();
        assert_eq!(view.status, RentalStatus::Overdue);

        // The stored row is still active
        let stored = db.rentals().get_by_id(&rental.rental_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RentalStatus::Active);

        // An overdue rental can still be extended, returned, cancelled
        ledger
            .extend_rental(&rental.rental_id, date(2026, 6, 12))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_return_requires_every_line_inspected() {
        let (ledger, clock, db) = setup().await;
        let item_a = seed_item(&db, "Camera", 2500).await;
        let item_b = seed_item(&db, "Tripod", 1000).await;

        let mut req = booking(&item_a, 4, date(2026, 6, 1), true);
        req.lines.push(daily_line(&item_b, 4));
        let rental = ledger.create_rental(req).await.unwrap();
        assert_eq!(rental.rental_price_cents, 14000);

        clock.set(date(2026, 6, 5));
        let mut partial = good_return(&rental, SettlementPaymentType::Full, 0);
        partial.items.pop();
        let err = ledger.return_rental(partial).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // Unknown line items are rejected too
        let mut bogus = good_return(&rental, SettlementPaymentType::Full, 0);
        bogus.items[0].line_item_id = "no-such-line".to_string();
        let err = ledger.return_rental(bogus).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // The failed attempts changed nothing
        let view = ledger.get_rental(&rental.rental_id).await.unwrap();
        assert_eq!(view.status, RentalStatus::Active);
    }

    #[tokio::test]
    async fn test_return_frees_dates_for_rebooking() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 10, date(2026, 6, 1), true))
            .await
            .unwrap();

        // Early return on June 3
        clock.set(date(2026, 6, 3));
        let settlement = ledger
            .return_rental(good_return(&rental, SettlementPaymentType::Full, 0))
            .await
            .unwrap();
        assert_eq!(settlement.late_fee_cents, 0);

        // The originally booked window is free again
        let rebooked = ledger
            .create_rental(booking(&item_id, 5, date(2026, 6, 4), true))
            .await
            .unwrap();
        assert_eq!(rebooked.status, RentalStatus::Active);
    }

    #[tokio::test]
    async fn test_concurrent_bookings_have_one_winner() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let ledger = Arc::clone(&ledger);
            let item_id = item_id.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .create_rental(booking(&item_id, 4, date(2026, 6, 1), false))
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(db.intervals().load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_rebuild_preserves_reservations() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        // Fresh ledger over the same database, as after a restart
        let clock = TestClock::starting(date(2026, 6, 2));
        let restarted = BookingLedger::new(db.clone(), LedgerConfig::new("branch-1"))
            .with_clock(clock);
        restarted.load().await.unwrap();

        let err = restarted
            .create_rental(booking(&item_id, 2, date(2026, 6, 3), false))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_booking_validation() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;

        // Zero duration
        let err = ledger
            .create_rental(booking(&item_id, 0, date(2026, 6, 1), true))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // No lines
        let mut empty = booking(&item_id, 4, date(2026, 6, 1), true);
        empty.lines.clear();
        let err = ledger.create_rental(empty).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // Unknown item
        let err = ledger
            .create_rental(booking("no-such-item", 4, date(2026, 6, 1), true))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        // Deposit above the rental price
        let mut over = booking(&item_id, 4, date(2026, 6, 1), true);
        over.deposit_cents = 99999;
        let err = ledger.create_rental(over).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // Same item twice on one rental
        let mut doubled = booking(&item_id, 4, date(2026, 6, 1), true);
        doubled.lines.push(doubled.lines[0].clone());
        let err = ledger.create_rental(doubled).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // No rate configured for the requested billing unit
        let mut monthly = booking(&item_id, 1, date(2026, 6, 1), true);
        monthly.lines[0].rate_type = RateType::Monthly;
        let err = ledger.create_rental(monthly).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // A line naming neither an item nor a product
        let mut unaddressed = booking(&item_id, 4, date(2026, 6, 1), true);
        unaddressed.lines[0].inventory_item_id = None;
        let err = ledger.create_rental(unaddressed).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // A denied booking reserves nothing
        assert!(db.intervals().load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_line_books_a_free_unit() {
        let (ledger, _clock, db) = setup().await;
        let unit_a = seed_item(&db, "Canon EOS R5 #1", 2500).await;
        let unit_b = seed_item(&db, "Canon EOS R5 #2", 2500).await;

        // unit_a is taken for the range; the product line lands on unit_b
        ledger
            .create_rental(booking(&unit_a, 4, date(2026, 6, 1), true))
            .await
            .unwrap();
        let rental = ledger
            .create_rental(product_booking("prod-1", 4, date(2026, 6, 1)))
            .await
            .unwrap();
        assert_eq!(rental.lines[0].inventory_item_id, unit_b);
        assert_eq!(rental.rental_price_cents, 10000);

        // Both units busy now: the next product request is denied and
        // the conflict listing names the winners
        let err = ledger
            .create_rental(product_booking("prod-1", 2, date(2026, 6, 3)))
            .await
            .unwrap_err();
        match err {
            LedgerError::Conflict { conflicts } => assert_eq!(conflicts.len(), 2),
            other => panic!("expected Conflict, got {other:?}"),
        }

        // Unknown product is a lookup failure
        let err = ledger
            .create_rental(product_booking("prod-9", 2, date(2026, 6, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        // Two product lines on one rental take two distinct units
        let mut doubled = product_booking("prod-1", 2, date(2026, 7, 1));
        doubled.lines.push(doubled.lines[0].clone());
        let rental = ledger.create_rental(doubled).await.unwrap();
        assert_ne!(
            rental.lines[0].inventory_item_id,
            rental.lines[1].inventory_item_id
        );
    }

    #[tokio::test]
    async fn test_unit_price_override_beats_catalog_rate() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;

        // Negotiated 10.00/day instead of the 25.00 catalog rate
        let mut req = booking(&item_id, 4, date(2026, 6, 1), true);
        req.lines[0].unit_price_cents = Some(1000);
        let rental = ledger.create_rental(req).await.unwrap();
        assert_eq!(rental.lines[0].unit_price_cents, 1000);
        assert_eq!(rental.rental_price_cents, 4000);
        assert_balanced(&db, &rental.rental_id).await;

        // A negative override is rejected before any mutation
        let mut req = booking(&item_id, 2, date(2026, 7, 1), true);
        req.lines[0].unit_price_cents = Some(-100);
        let err = ledger.create_rental(req).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));

        // An override also prices items with no configured rate
        let mut req = booking(&item_id, 1, date(2026, 8, 1), true);
        req.lines[0].rate_type = RateType::Monthly;
        req.lines[0].unit_price_cents = Some(50000);
        let rental = ledger.create_rental(req).await.unwrap();
        assert_eq!(rental.rental_price_cents, 50000);
        assert_eq!(rental.end_date, date(2026, 8, 31));
    }

    #[tokio::test]
    async fn test_product_availability_needs_one_free_unit() {
        let (ledger, _clock, db) = setup().await;
        let unit_a = seed_item(&db, "Canon EOS R5 #1", 2500).await;
        let _unit_b = seed_item(&db, "Canon EOS R5 #2", 2500).await;

        // One unit booked, the other free: the product is available
        ledger
            .create_rental(booking(&unit_a, 4, date(2026, 6, 1), true))
            .await
            .unwrap();
        let check = ledger
            .check_product_availability("prod-1", date(2026, 6, 1), date(2026, 6, 5))
            .await
            .unwrap();
        assert!(check.available);
        assert_eq!(check.conflicts.len(), 1);

        // Unknown product is a lookup failure, not "available"
        let err = ledger
            .check_product_availability("prod-9", date(2026, 6, 1), date(2026, 6, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_out_of_service_items_are_never_available() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        db.items()
            .update_status(&item_id, ItemStatus::Maintenance)
            .await
            .unwrap();

        let check = ledger
            .check_availability(CheckAvailabilityRequest {
                inventory_item_ids: vec![item_id.clone()],
                start_date: date(2026, 6, 1),
                end_date: date(2026, 6, 5),
            })
            .await
            .unwrap();
        assert!(!check.available);
        assert!(check.conflicts.is_empty());
        assert_eq!(check.out_of_service, vec![item_id]);

        // An unknown item is a lookup failure, not "out of service"
        let err = ledger
            .check_availability(CheckAvailabilityRequest {
                inventory_item_ids: vec!["no-such-item".to_string()],
                start_date: date(2026, 6, 1),
                end_date: date(2026, 6, 5),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_weekly_rate_pricing_and_end_date() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;

        // 2 weeks at 150.00/week → 300.00, 14 implied days
        let mut req = booking(&item_id, 2, date(2026, 6, 1), true);
        req.lines[0].rate_type = RateType::Weekly;
        let rental = ledger.create_rental(req).await.unwrap();

        assert_eq!(rental.rental_price_cents, 30000);
        assert_eq!(rental.end_date, date(2026, 6, 15));
        assert_balanced(&db, &rental.rental_id).await;
    }

    #[tokio::test]
    async fn test_lost_item_is_retired() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        clock.set(date(2026, 6, 5));
        let mut req = good_return(&rental, SettlementPaymentType::Credit, 0);
        req.items[0].condition = ItemCondition::Lost;
        req.items[0].damage = vec![DamageFieldInput {
            field: "replacement".to_string(),
            fee_cents: 50000,
            notes: None,
        }];

        let settlement = ledger.return_rental(req).await.unwrap();
        assert_eq!(settlement.damage_fee_cents, 50000);
        assert_eq!(settlement.total_cost_cents, 60000);
        assert_balanced(&db, &rental.rental_id).await;

        let item = db.items().get_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Retired);

        // A retired item can no longer be booked
        let err = ledger
            .create_rental(booking(&item_id, 2, date(2026, 7, 1), true))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_explicit_return_date_drives_the_late_fee() {
        let (ledger, _clock, db) = setup().await;
        let item_id = seed_item(&db, "Camera", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        // Operator records a June 8 return explicitly
        let mut req = good_return(&rental, SettlementPaymentType::Credit, 0);
        req.return_date = Some(date(2026, 6, 8));
        let settlement = ledger.return_rental(req).await.unwrap();
        assert_eq!(settlement.days_late, 3);
        assert_eq!(settlement.late_fee_cents, 4500);
        assert_balanced(&db, &rental.rental_id).await;
    }

    #[tokio::test]
    async fn test_cleaning_fee_charged_only_when_flagged() {
        let (ledger, clock, db) = setup().await;
        let item_id = seed_item(&db, "Dress", 2500).await;
        let rental = ledger
            .create_rental(booking(&item_id, 4, date(2026, 6, 1), true))
            .await
            .unwrap();

        clock.set(date(2026, 6, 5));
        let mut req = good_return(&rental, SettlementPaymentType::Full, 0);
        req.needs_cleaning = true;
        req.cleaning_fee_cents = 1500;

        let settlement = ledger.return_rental(req).await.unwrap();
        assert_eq!(settlement.cleaning_fee_cents, 1500);
        assert_eq!(settlement.total_cost_cents, 11500);
        assert_balanced(&db, &rental.rental_id).await;
    }
}
