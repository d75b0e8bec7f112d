//! # Booking Interval Repository
//!
//! Durable form of the in-memory availability index. The index is the
//! authority at runtime; this table exists so the index can be rebuilt
//! from committed state after a restart.
//!
//! Rows exist only while the owning rental blocks availability. Return
//! and cancellation delete them; an extension widens `end_date`.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// One committed reservation of one inventory item, as persisted.
///
/// Carries rental number and customer name snapshots so conflict
/// listings never need a join back to `rentals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInterval {
    pub inventory_item_id: String,
    pub rental_id: String,
    pub rental_number: String,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Repository for booking interval persistence.
#[derive(Debug, Clone)]
pub struct IntervalRepository {
    pool: SqlitePool,
}

impl IntervalRepository {
    /// Creates a new IntervalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IntervalRepository { pool }
    }

    /// Persists one booking interval.
    pub async fn insert(&self, interval: &StoredInterval) -> DbResult<()> {
        debug!(
            item = %interval.inventory_item_id,
            rental = %interval.rental_id,
            "Persisting booking interval"
        );

        sqlx::query(
            r#"
            INSERT INTO booking_intervals (
                inventory_item_id, rental_id, rental_number, customer_name,
                start_date, end_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&interval.inventory_item_id)
        .bind(&interval.rental_id)
        .bind(&interval.rental_number)
        .bind(&interval.customer_name)
        .bind(interval.start_date)
        .bind(interval.end_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes one item's interval for a rental. Idempotent: deleting
    /// an interval that is already gone is not an error.
    pub async fn delete(&self, inventory_item_id: &str, rental_id: &str) -> DbResult<()> {
        sqlx::query(
            "DELETE FROM booking_intervals WHERE inventory_item_id = ?1 AND rental_id = ?2",
        )
        .bind(inventory_item_id)
        .bind(rental_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes every interval held by a rental (return, cancellation).
    pub async fn delete_for_rental(&self, rental_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM booking_intervals WHERE rental_id = ?1")
            .bind(rental_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Widens the end date of every interval held by a rental.
    pub async fn update_end_date(&self, rental_id: &str, new_end_date: NaiveDate) -> DbResult<()> {
        sqlx::query("UPDATE booking_intervals SET end_date = ?2 WHERE rental_id = ?1")
            .bind(rental_id)
            .bind(new_end_date)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Loads every persisted interval, for index rebuild at startup.
    pub async fn load_all(&self) -> DbResult<Vec<StoredInterval>> {
        let rows = sqlx::query(
            r#"
            SELECT inventory_item_id, rental_id, rental_number, customer_name,
                   start_date, end_date
            FROM booking_intervals
            ORDER BY inventory_item_id, start_date
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interval_from_row).collect()
    }
}

fn interval_from_row(row: &SqliteRow) -> DbResult<StoredInterval> {
    Ok(StoredInterval {
        inventory_item_id: row.try_get("inventory_item_id")?,
        rental_id: row.try_get("rental_id")?,
        rental_number: row.try_get("rental_number")?,
        customer_name: row.try_get("customer_name")?,
        start_date: row.try_get::<NaiveDate, _>("start_date")?,
        end_date: row.try_get::<NaiveDate, _>("end_date")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
