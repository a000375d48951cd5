//! # Inventory Ledger Repository
//!
//! Read path for the append-only inventory ledger, plus the shared
//! in-transaction append helper used by every stock-mutating path.
//!
//! ## Ledger Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              stock_quantity is a cached projection                      │
//! │                                                                         │
//! │  inventory_log (append-only, source of truth)                          │
//! │  ┌──────────┬────────────┬─────────────────┐                           │
//! │  │ +25      │ adjustment │ initial stock   │                           │
//! │  │ −3       │ sale       │ order ref       │                           │
//! │  │ +40      │ restock    │ delivery ref    │                           │
//! │  │ −10      │ sale       │ order ref       │                           │
//! │  └──────────┴────────────┴─────────────────┘                           │
//! │        Σ quantity_change = 52                                          │
//! │                                                                         │
//! │  products.stock_quantity MUST equal 52 at all times.                   │
//! │  stock_drift() returns the difference; nonzero means a write           │
//! │  bypassed the ledger, which is a data-integrity bug.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writers never call this repository directly: appends happen through
//! [`append_entry`] inside the same transaction as the stock update they
//! describe (order executor, stocktake adjustment, restock).

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::{InventoryChangeType, InventoryLogEntry};

/// Repository for inventory ledger reads.
#[derive(Debug, Clone)]
pub struct InventoryLogRepository {
    pool: SqlitePool,
}

impl InventoryLogRepository {
    /// Creates a new InventoryLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLogRepository { pool }
    }

    /// Returns ledger entries for a product, newest first.
    ///
    /// ## Arguments
    /// * `product_id` - Product UUID
    /// * `limit` - Maximum entries to return
    pub async fn history(&self, product_id: &str, limit: u32) -> DbResult<Vec<InventoryLogEntry>> {
        let entries = sqlx::query_as::<_, InventoryLogEntry>(
            r#"
            SELECT
                id, product_id, user_id, quantity_change, change_type,
                reference_id, notes, created_at
            FROM inventory_log
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Returns entries attributed to one originating event (e.g. an order).
    pub async fn by_reference(&self, reference_id: &str) -> DbResult<Vec<InventoryLogEntry>> {
        let entries = sqlx::query_as::<_, InventoryLogEntry>(
            r#"
            SELECT
                id, product_id, user_id, quantity_change, change_type,
                reference_id, notes, created_at
            FROM inventory_log
            WHERE reference_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Returns Σ quantity_change for a product across the whole ledger.
    ///
    /// For a product whose initial stock was logged at creation (the only
    /// supported path), this equals the expected stock_quantity.
    pub async fn net_change(&self, product_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_change), 0) FROM inventory_log WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    /// Returns `stock_quantity − Σ quantity_change` for a product.
    ///
    /// ## Returns
    /// * `Ok(0)` - projection and ledger agree (healthy)
    /// * `Ok(n)`, n ≠ 0 - some write bypassed the ledger; treat as a bug
    /// * `Err(DbError::NotFound)` - unknown product
    pub async fn stock_drift(&self, product_id: &str) -> DbResult<i64> {
        let drift: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT
                p.stock_quantity - COALESCE(
                    (SELECT SUM(l.quantity_change) FROM inventory_log l WHERE l.product_id = p.id),
                    0
                )
            FROM products p
            WHERE p.id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        drift.ok_or_else(|| DbError::not_found("Product", product_id))
    }
}

// =============================================================================
// In-Transaction Append
// =============================================================================

/// A ledger entry about to be written.
///
/// Borrowed view over caller data; the id and timestamp are assigned at
/// append time.
#[derive(Debug)]
pub(crate) struct NewLogEntry<'a> {
    pub product_id: &'a str,
    pub user_id: &'a str,
    pub quantity_change: i64,
    pub change_type: InventoryChangeType,
    pub reference_id: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Appends a ledger entry inside the caller's transaction.
///
/// Every stock_quantity write goes through a transaction that also calls
/// this; there is deliberately no pool-based variant.
pub(crate) async fn append_entry(
    tx: &mut Transaction<'_, Sqlite>,
    entry: NewLogEntry<'_>,
) -> DbResult<()> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    debug!(
        product_id = %entry.product_id,
        quantity_change = entry.quantity_change,
        change_type = ?entry.change_type,
        "Appending inventory log entry"
    );

    sqlx::query(
        r#"
        INSERT INTO inventory_log (
            id, product_id, user_id, quantity_change, change_type,
            reference_id, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(entry.product_id)
    .bind(entry.user_id)
    .bind(entry.quantity_change)
    .bind(entry.change_type)
    .bind(entry.reference_id)
    .bind(entry.notes)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
