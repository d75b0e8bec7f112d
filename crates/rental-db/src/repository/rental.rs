//! # Rental Repository
//!
//! Database operations for rentals, their line items, and payments.
//!
//! ## Rental Lifecycle (persisted form)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Rental Lifecycle                                  │
//! │                                                                         │
//! │  1. BOOK                                                               │
//! │     └── insert_rental() → rental + line items in one transaction       │
//! │     └── add_payment()   → opening deposit, if any                      │
//! │                                                                         │
//! │  2. PICKUP / EXTEND                                                    │
//! │     └── update_status()   → reserved → active                          │
//! │     └── update_end_date() → widened by an extension                    │
//! │                                                                         │
//! │  3. RETURN                                                             │
//! │     └── record_line_return() per item (condition, damage)              │
//! │     └── apply_settlement() → fees + balances + status = returned       │
//! │                                                                         │
//! │  4. (OPTIONAL) TOP-UP                                                  │
//! │     └── update_balances() + add_payment() → debt collection            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status guards live in the ledger (rental-core state machine); the
//! repository only persists what the ledger already validated.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use rental_core::{
    ItemCondition, Payment, PaymentStatus, Rental, RentalLineItem, RentalStatus, SettlementResult,
};

/// Repository for rental database operations.
#[derive(Debug, Clone)]
pub struct RentalRepository {
    pool: SqlitePool,
}

impl RentalRepository {
    /// Creates a new RentalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RentalRepository { pool }
    }

    /// Inserts a rental and all its line items in one transaction.
    ///
    /// ## Snapshot Pattern
    /// Item names and unit prices are already frozen on the line items;
    /// the rental history stays consistent even if catalog data changes.
    pub async fn insert_rental(&self, rental: &Rental, lines: &[RentalLineItem]) -> DbResult<()> {
        debug!(id = %rental.id, rental_number = %rental.rental_number, lines = lines.len(), "Inserting rental");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO rentals (
                id, rental_number, customer_id, customer_name, branch_id,
                start_date, end_date, status, payment_status,
                rental_price_cents, deposit_cents,
                late_fee_cents, damage_fee_cents, cleaning_fee_cents,
                paid_cents, credit_cents,
                collateral, cancel_reason,
                created_at, updated_at, returned_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16,
                ?17, ?18,
                ?19, ?20, ?21
            )
            "#,
        )
        .bind(&rental.id)
        .bind(&rental.rental_number)
        .bind(&rental.customer_id)
        .bind(&rental.customer_name)
        .bind(&rental.branch_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .bind(rental.status)
        .bind(rental.payment_status)
        .bind(rental.rental_price_cents)
        .bind(rental.deposit_cents)
        .bind(rental.late_fee_cents)
        .bind(rental.damage_fee_cents)
        .bind(rental.cleaning_fee_cents)
        .bind(rental.paid_cents)
        .bind(rental.credit_cents)
        .bind(&rental.collateral)
        .bind(&rental.cancel_reason)
        .bind(rental.created_at)
        .bind(rental.updated_at)
        .bind(rental.returned_at)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO rental_items (
                    id, rental_id, inventory_item_id, name_snapshot,
                    rate_type, unit_price_cents, duration, line_total_cents,
                    notes, condition_on_return, damage_notes, damage_fee_cents,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(&line.id)
            .bind(&line.rental_id)
            .bind(&line.inventory_item_id)
            .bind(&line.name_snapshot)
            .bind(line.rate_type)
            .bind(line.unit_price_cents)
            .bind(line.duration)
            .bind(line.line_total_cents)
            .bind(&line.notes)
            .bind(line.condition_on_return)
            .bind(&line.damage_notes)
            .bind(line.damage_fee_cents)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a rental by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Rental>> {
        let row = sqlx::query(
            r#"
            SELECT id, rental_number, customer_id, customer_name, branch_id,
                   start_date, end_date, status, payment_status,
                   rental_price_cents, deposit_cents,
                   late_fee_cents, damage_fee_cents, cleaning_fee_cents,
                   paid_cents, credit_cents,
                   collateral, cancel_reason,
                   created_at, updated_at, returned_at
            FROM rentals
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| rental_from_row(&r)).transpose()
    }

    /// Gets all line items for a rental.
    pub async fn get_items(&self, rental_id: &str) -> DbResult<Vec<RentalLineItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, rental_id, inventory_item_id, name_snapshot,
                   rate_type, unit_price_cents, duration, line_total_cents,
                   notes, condition_on_return, damage_notes, damage_fee_cents,
                   created_at
            FROM rental_items
            WHERE rental_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(line_from_row).collect()
    }

    /// Updates a rental's status.
    pub async fn update_status(&self, id: &str, status: RentalStatus) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE rentals SET status = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rental", id));
        }

        Ok(())
    }

    /// Marks a rental cancelled, storing the reason.
    ///
    /// Payments already recorded are untouched: cancellation frees
    /// inventory, reconciliation is an external accounting concern.
    pub async fn set_cancelled(&self, id: &str, reason: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE rentals SET status = 'cancelled', cancel_reason = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rental", id));
        }

        Ok(())
    }

    /// Widens a rental's end date after a successful extension.
    pub async fn update_end_date(&self, id: &str, new_end_date: NaiveDate) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE rentals SET end_date = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(new_end_date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rental", id));
        }

        Ok(())
    }

    /// Records return-time condition and damage on one line item.
    pub async fn record_line_return(
        &self,
        line_id: &str,
        condition: ItemCondition,
        damage_notes: Option<&str>,
        damage_fee_cents: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE rental_items
            SET condition_on_return = ?2, damage_notes = ?3, damage_fee_cents = ?4
            WHERE id = ?1
            "#,
        )
        .bind(line_id)
        .bind(condition)
        .bind(damage_notes)
        .bind(damage_fee_cents)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rental line item", line_id));
        }

        Ok(())
    }

    /// Applies the computed settlement: fee totals, balances, payment
    /// status, and the terminal `returned` state, in one update.
    pub async fn apply_settlement(
        &self,
        id: &str,
        settlement: &SettlementResult,
        returned_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, total_cost = settlement.total_cost_cents, "Applying settlement");

        let result = sqlx::query(
            r#"
            UPDATE rentals SET
                status = 'returned',
                payment_status = ?2,
                late_fee_cents = ?3,
                damage_fee_cents = ?4,
                cleaning_fee_cents = ?5,
                paid_cents = ?6,
                credit_cents = ?7,
                returned_at = ?8,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(settlement.payment_status)
        .bind(settlement.late_fee_cents)
        .bind(settlement.damage_fee_cents)
        .bind(settlement.cleaning_fee_cents)
        .bind(settlement.new_paid_cents)
        .bind(settlement.new_credit_cents)
        .bind(returned_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rental", id));
        }

        Ok(())
    }

    /// Updates the running balances after a post-return top-up.
    pub async fn update_balances(
        &self,
        id: &str,
        paid_cents: i64,
        credit_cents: i64,
        payment_status: PaymentStatus,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE rentals SET
                paid_cents = ?2, credit_cents = ?3, payment_status = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(paid_cents)
        .bind(credit_cents)
        .bind(payment_status)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rental", id));
        }

        Ok(())
    }

    /// Records a payment for a rental. Append-only.
    pub async fn add_payment(&self, payment: &Payment) -> DbResult<()> {
        debug!(rental_id = %payment.rental_id, amount = %payment.amount_cents, "Recording payment");

        sqlx::query(
            r#"
            INSERT INTO payments (id, rental_id, method, amount_cents, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.rental_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets all payments for a rental, oldest first.
    pub async fn get_payments(&self, rental_id: &str) -> DbResult<Vec<Payment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, rental_id, method, amount_cents, notes, created_at
            FROM payments
            WHERE rental_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payment_from_row).collect()
    }

    /// Gets the total amount paid for a rental.
    pub async fn get_total_paid(&self, rental_id: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM payments WHERE rental_id = ?1")
                .bind(rental_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn rental_from_row(row: &SqliteRow) -> DbResult<Rental> {
    Ok(Rental {
        id: row.try_get("id")?,
        rental_number: row.try_get("rental_number")?,
        customer_id: row.try_get("customer_id")?,
        customer_name: row.try_get("customer_name")?,
        branch_id: row.try_get("branch_id")?,
        start_date: row.try_get::<NaiveDate, _>("start_date")?,
        end_date: row.try_get::<NaiveDate, _>("end_date")?,
        status: row.try_get("status")?,
        payment_status: row.try_get("payment_status")?,
        rental_price_cents: row.try_get("rental_price_cents")?,
        deposit_cents: row.try_get("deposit_cents")?,
        late_fee_cents: row.try_get("late_fee_cents")?,
        damage_fee_cents: row.try_get("damage_fee_cents")?,
        cleaning_fee_cents: row.try_get("cleaning_fee_cents")?,
        paid_cents: row.try_get("paid_cents")?,
        credit_cents: row.try_get("credit_cents")?,
        collateral: row.try_get("collateral")?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        returned_at: row.try_get::<Option<DateTime<Utc>>, _>("returned_at")?,
    })
}

fn line_from_row(row: &SqliteRow) -> DbResult<RentalLineItem> {
    Ok(RentalLineItem {
        id: row.try_get("id")?,
        rental_id: row.try_get("rental_id")?,
        inventory_item_id: row.try_get("inventory_item_id")?,
        name_snapshot: row.try_get("name_snapshot")?,
        rate_type: row.try_get("rate_type")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        duration: row.try_get("duration")?,
        line_total_cents: row.try_get("line_total_cents")?,
        notes: row.try_get("notes")?,
        condition_on_return: row.try_get("condition_on_return")?,
        damage_notes: row.try_get("damage_notes")?,
        damage_fee_cents: row.try_get("damage_fee_cents")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn payment_from_row(row: &SqliteRow) -> DbResult<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        rental_id: row.try_get("rental_id")?,
        method: row.try_get("method")?,
        amount_cents: row.try_get("amount_cents")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
