//! # Product Repository
//!
//! Database operations for catalog products.
//!
//! ## Key Operations
//! - CRUD with soft delete
//! - Stock movements (stocktake adjustment, restock)
//! - Low-stock queries for dashboards
//!
//! ## Stock Movement Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Every stock write carries a ledger entry                   │
//! │                                                                         │
//! │  create()     → INSERT product   + 'adjustment' entry (initial stock)  │
//! │  set_stock()  → UPDATE stock     + 'adjustment' entry (delta)          │
//! │  restock()    → stock += qty     + 'restock' entry                     │
//! │  (sales)      → handled by the order repository, 'sale' entries        │
//! │                                                                         │
//! │  update() deliberately CANNOT touch stock_quantity: catalog edits      │
//! │  and stock movements are separate writer paths.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreResult};
use crate::repository::inventory::{append_entry, NewLogEntry};
use atlas_core::validation::{
    validate_product_name, validate_reorder_level, validate_sku, validate_tax_rate_bps,
};
use atlas_core::{InventoryChangeType, Product, ValidationError};

/// Fields accepted when creating a product.
///
/// The id and timestamps are assigned by the repository; initial stock is
/// logged to the inventory ledger in the same transaction as the insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub purchase_price_cents: i64,
    pub selling_price_cents: i64,
    pub discount_price_cents: Option<i64>,
    pub tax_rate_bps: u32,
    pub stock_quantity: i64,
    pub reorder_level: i64,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create(&new_product, "user-1").await?;
/// let low = repo.low_stock(10).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                purchase_price_cents, selling_price_cents, discount_price_cents,
                tax_rate_bps, stock_quantity, reorder_level, is_active,
                created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                purchase_price_cents, selling_price_cents, discount_price_cents,
                tax_rate_bps, stock_quantity, reorder_level, is_active,
                created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                purchase_price_cents, selling_price_cents, discount_price_cents,
                tax_rate_bps, stock_quantity, reorder_level, is_active,
                created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Creates a product and logs its initial stock.
    ///
    /// ## What This Does
    /// 1. Validates sku, name, prices, tax rate, reorder level
    /// 2. Inserts the product row
    /// 3. Appends an 'adjustment' ledger entry for the initial stock
    ///    (also when it is zero, so the ledger covers the full lifetime)
    /// 4. Commits both writes atomically
    ///
    /// ## Errors
    /// * `StoreError::Core(Validation)` - a field failed validation
    /// * `StoreError::Storage(UniqueViolation)` - SKU already exists
    pub async fn create(&self, new: &NewProduct, user_id: &str) -> StoreResult<Product> {
        validate_sku(&new.sku)?;
        validate_product_name(&new.name)?;
        validate_tax_rate_bps(new.tax_rate_bps)?;
        validate_reorder_level(new.reorder_level)?;
        for (field, cents) in [
            ("purchase_price", new.purchase_price_cents),
            ("selling_price", new.selling_price_cents),
            ("discount_price", new.discount_price_cents.unwrap_or(0)),
        ] {
            atlas_core::validation::validate_price_cents(field, cents)?;
        }
        if new.stock_quantity < 0 {
            return Err(ValidationError::OutOfRange {
                field: "stock_quantity".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(sku = %new.sku, id = %id, "Creating product");

        let product = Product {
            id: id.clone(),
            sku: new.sku.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            purchase_price_cents: new.purchase_price_cents,
            selling_price_cents: new.selling_price_cents,
            discount_price_cents: new.discount_price_cents,
            tax_rate_bps: new.tax_rate_bps,
            stock_quantity: new.stock_quantity,
            reorder_level: new.reorder_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description,
                purchase_price_cents, selling_price_cents, discount_price_cents,
                tax_rate_bps, stock_quantity, reorder_level, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.purchase_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.discount_price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        append_entry(
            &mut tx,
            NewLogEntry {
                product_id: &product.id,
                user_id,
                quantity_change: product.stock_quantity,
                change_type: InventoryChangeType::Adjustment,
                reference_id: None,
                notes: Some("Initial stock on product creation"),
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        Ok(product)
    }

    /// Updates catalog fields of an existing product.
    ///
    /// The SKU is immutable and stock_quantity is not touched here; stock
    /// moves only through `set_stock`, `restock`, or the order transaction.
    ///
    /// ## Errors
    /// * `StoreError::Core(Validation)` - a field failed validation
    /// * `StoreError::Storage(NotFound)` - product doesn't exist
    pub async fn update(&self, product: &Product) -> StoreResult<()> {
        validate_product_name(&product.name)?;
        validate_tax_rate_bps(product.tax_rate_bps)?;
        validate_reorder_level(product.reorder_level)?;

        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                purchase_price_cents = ?4,
                selling_price_cents = ?5,
                discount_price_cents = ?6,
                tax_rate_bps = ?7,
                reorder_level = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.purchase_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.discount_price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.reorder_level)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id).into());
        }

        Ok(())
    }

    /// Sets absolute stock for a product (stocktake correction).
    ///
    /// ## What This Does
    /// 1. Reads the current stock inside a transaction
    /// 2. Writes the new absolute value
    /// 3. Appends an 'adjustment' ledger entry for the signed delta
    ///
    /// A no-op when the new value equals the current one (nothing to log).
    pub async fn set_stock(
        &self,
        id: &str,
        new_quantity: i64,
        user_id: &str,
        notes: Option<&str>,
    ) -> StoreResult<Product> {
        if new_quantity < 0 {
            return Err(ValidationError::OutOfRange {
                field: "stock_quantity".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut product = fetch_active(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        let delta = new_quantity - product.stock_quantity;
        if delta == 0 {
            return Ok(product);
        }

        debug!(id = %id, delta = delta, "Adjusting stock");

        let now = Utc::now();

        sqlx::query("UPDATE products SET stock_quantity = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(new_quantity)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        append_entry(
            &mut tx,
            NewLogEntry {
                product_id: id,
                user_id,
                quantity_change: delta,
                change_type: InventoryChangeType::Adjustment,
                reference_id: None,
                notes: notes.or(Some("Stock adjustment")),
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        product.stock_quantity = new_quantity;
        product.updated_at = now;
        Ok(product)
    }

    /// Increments stock for a supplier delivery.
    ///
    /// ## Arguments
    /// * `quantity` - Units received; must be positive
    /// * `reference_id` - Delivery/PO reference carried into the ledger
    pub async fn restock(
        &self,
        id: &str,
        quantity: i64,
        user_id: &str,
        reference_id: Option<&str>,
        notes: Option<&str>,
    ) -> StoreResult<Product> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        debug!(id = %id, quantity = quantity, "Restocking product");

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id).into());
        }

        append_entry(
            &mut tx,
            NewLogEntry {
                product_id: id,
                user_id,
                quantity_change: quantity,
                change_type: InventoryChangeType::Restock,
                reference_id,
                notes: notes.or(Some("Supplier restock")),
            },
        )
        .await?;

        let product = fetch_active(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        tx.commit().await.map_err(DbError::from)?;

        Ok(product)
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical orders and ledger entries still reference it; no rows are
    /// removed and stock stays as-is.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists active products at or below their reorder level, lowest
    /// stock first.
    ///
    /// ## Usage
    /// Dashboard "needs reordering" panel and restock planning.
    pub async fn low_stock(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                purchase_price_cents, selling_price_cents, discount_price_cents,
                tax_rate_bps, stock_quantity, reorder_level, is_active,
                created_at, updated_at
            FROM products
            WHERE is_active = 1 AND stock_quantity <= reorder_level
            ORDER BY stock_quantity ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts active products at or below their reorder level.
    pub async fn low_stock_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE is_active = 1 AND stock_quantity <= reorder_level",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Fetches an active product inside the caller's transaction.
pub(crate) async fn fetch_active(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT
            id, sku, name, description,
            purchase_price_cents, selling_price_cents, discount_price_cents,
            tax_rate_bps, stock_quantity, reorder_level, is_active,
            created_at, updated_at
        FROM products
        WHERE id = ?1 AND is_active = 1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(product)
}
