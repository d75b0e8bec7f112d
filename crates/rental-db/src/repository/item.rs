//! # Inventory Item Repository
//!
//! Reads and status updates for physically trackable rental units.
//! Items are created by catalog management; the booking ledger only
//! flips their status as rentals activate and release.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use rental_core::{ItemStatus, RentalInventoryItem};

/// Repository for inventory item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an inventory item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RentalInventoryItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, name,
                   daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
                   status, created_at, updated_at
            FROM inventory_items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| item_from_row(&r)).transpose()
    }

    /// Gets all inventory items belonging to a product.
    ///
    /// Used for product-level availability checks: "is any unit of this
    /// dress free for those dates?".
    pub async fn list_by_product(&self, product_id: &str) -> DbResult<Vec<RentalInventoryItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, name,
                   daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
                   status, created_at, updated_at
            FROM inventory_items
            WHERE product_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// Inserts an inventory item.
    ///
    /// Catalog management owns item creation; this exists for seeding
    /// and tests.
    pub async fn insert(&self, item: &RentalInventoryItem) -> DbResult<()> {
        debug!(id = %item.id, name = %item.name, "Inserting inventory item");

        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, product_id, name,
                daily_rate_cents, weekly_rate_cents, monthly_rate_cents,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.daily_rate_cents)
        .bind(item.weekly_rate_cents)
        .bind(item.monthly_rate_cents)
        .bind(item.status)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an item's status.
    pub async fn update_status(&self, id: &str, status: ItemStatus) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE inventory_items SET status = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Inventory item", id));
        }

        Ok(())
    }
}

/// Maps a database row to a RentalInventoryItem.
fn item_from_row(row: &SqliteRow) -> DbResult<RentalInventoryItem> {
    Ok(RentalInventoryItem {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        name: row.try_get("name")?,
        daily_rate_cents: row.try_get("daily_rate_cents")?,
        weekly_rate_cents: row.try_get("weekly_rate_cents")?,
        monthly_rate_cents: row.try_get("monthly_rate_cents")?,
        status: row.try_get("status")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
