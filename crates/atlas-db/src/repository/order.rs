//! # Order Repository
//!
//! Order placement and reads. `create_order` is the single writer path for
//! sale stock decrements.
//!
//! ## The Order Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create_order(request, user_id)                       │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   │                                                                     │
//! │   ├── 1. fetch active products referenced by the request               │
//! │   ├── 2. price + validate lines (atlas_core::price_order)              │
//! │   ├── 3. INSERT order header (aggregate totals)                        │
//! │   │                                                                     │
//! │   ├── per line, in request order:                                      │
//! │   │    ├── INSERT order_items (price snapshot)                         │
//! │   │    ├── UPDATE products SET stock = stock − qty                     │
//! │   │    │       WHERE id = ? AND stock >= qty   ← guarded decrement     │
//! │   │    │       (0 rows → abort whole transaction)                      │
//! │   │    └── INSERT inventory_log (−qty, 'sale', order id)               │
//! │   │                                                                     │
//! │   ├── 4. payment_status = completed?                                   │
//! │   │       └── INSERT payments (amount = order total)                   │
//! │   │                                                                     │
//! │  COMMIT ──► read back {order, items, payments}                         │
//! │                                                                         │
//! │  Any error anywhere → ROLLBACK, nothing visible, typed error out       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why the Guarded Decrement
//! Two connections can both pass the read-side stock check before either
//! commits. The decrement re-checks `stock_quantity >= qty` in the same
//! statement that mutates it, so the losing transaction either observes the
//! committed decrement (0 rows → InsufficientStock) or fails its lock
//! upgrade (SQLITE_BUSY → Conflict). Stock can never go negative.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreError, StoreResult};
use crate::repository::inventory::{append_entry, NewLogEntry};
use crate::repository::product::fetch_active;
use atlas_core::{
    price_order, CoreError, InventoryChangeType, Order, OrderItem, OrderLineRequest, OrderRequest,
    OrderStatus, Payment, PricedLine, PricedOrder, Product,
};

/// The full order aggregate as read back after commit.
/// Serializes to the shape API layers return for order creation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

/// Repository for order placement and reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Prices an order request without writing anything.
    ///
    /// ## Usage
    /// Pre-flight validation for carts and quotes. The result is advisory:
    /// stock may change between this call and `create_order`, which re-runs
    /// the same checks inside its transaction.
    pub async fn price_order(&self, items: &[OrderLineRequest]) -> StoreResult<PricedOrder> {
        let mut catalog: HashMap<String, Product> = HashMap::new();

        for item in items {
            if catalog.contains_key(&item.product_id) {
                continue;
            }
            let row = sqlx::query_as::<_, Product>(
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
            .bind(&item.product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

            if let Some(product) = row {
                catalog.insert(item.product_id.clone(), product);
            }
        }

        Ok(price_order(items, |id| catalog.get(id))?)
    }

    /// Places an order: one transaction, all-or-nothing.
    ///
    /// ## Arguments
    /// * `request` - Lines plus order-level metadata (payment method/status,
    ///   requested order status, customer, notes)
    /// * `user_id` - The authenticated acting user, supplied by the caller
    ///
    /// ## Returns
    /// The committed aggregate read back from storage, so the caller sees
    /// exactly what any other reader would.
    ///
    /// ## Errors
    /// * `Core(EmptyOrder | ProductNotFound | InsufficientStock | Validation)`
    /// * `Conflict` - lost a lock race with a concurrent writer; nothing was
    ///   written and the request may be retried against fresh state
    /// * `Storage` - the database failed; nothing was written
    pub async fn create_order(
        &self,
        request: &OrderRequest,
        user_id: &str,
    ) -> StoreResult<OrderDetails> {
        if request.items.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        let order_id = match self.place_order_tx(request, user_id).await {
            Ok(order_id) => order_id,
            // A writer that cannot upgrade its read snapshot to a write
            // lock surfaces SQLITE_BUSY from whichever statement hit it
            Err(StoreError::Storage(DbError::Busy(msg))) => {
                debug!(busy = %msg, "Order transaction lost a lock race");
                return Err(StoreError::Conflict);
            }
            Err(other) => return Err(other),
        };

        let details = self
            .get_details(&order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", &order_id))?;

        Ok(details)
    }

    /// Runs the order transaction itself; returns the committed order id.
    async fn place_order_tx(&self, request: &OrderRequest, user_id: &str) -> StoreResult<String> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Authoritative validation happens against rows read inside this
        // transaction, not whatever the caller priced earlier.
        let mut catalog: HashMap<String, Product> = HashMap::new();
        for item in &request.items {
            if catalog.contains_key(&item.product_id) {
                continue;
            }
            if let Some(product) = fetch_active(&mut tx, &item.product_id).await? {
                catalog.insert(item.product_id.clone(), product);
            }
        }

        let priced = price_order(&request.items, |id| catalog.get(id))?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id.clone(),
            user_id: user_id.to_string(),
            total_amount_cents: priced.total_amount_cents,
            tax_amount_cents: priced.tax_amount_cents,
            discount_amount_cents: priced.discount_amount_cents,
            payment_method: request.payment_method.unwrap_or_default(),
            payment_status: request.payment_status.unwrap_or_default(),
            order_status: request.order_status.unwrap_or_default(),
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(
            order_id = %order.id,
            lines = priced.lines.len(),
            total_cents = order.total_amount_cents,
            "Placing order"
        );

        insert_order(&mut tx, &order).await?;

        for line in &priced.lines {
            insert_item(&mut tx, &order.id, line, now).await?;

            let applied = apply_sale_decrement(&mut tx, &line.product_id, line.quantity).await?;

            if !applied {
                // The guarded decrement said no: either the row is gone or
                // a committed competitor drained the stock first. The
                // transaction drop rolls back everything written so far.
                let available = current_stock(&mut tx, &line.product_id).await?;
                return Err(match available {
                    Some(available) => CoreError::InsufficientStock {
                        sku: line.sku.clone(),
                        available,
                        requested: line.quantity,
                    }
                    .into(),
                    None => CoreError::ProductNotFound(line.product_id.clone()).into(),
                });
            }

            append_entry(
                &mut tx,
                NewLogEntry {
                    product_id: &line.product_id,
                    user_id,
                    quantity_change: -line.quantity,
                    change_type: InventoryChangeType::Sale,
                    reference_id: Some(&order.id),
                    notes: None,
                },
            )
            .await?;
        }

        if order.payment_status == atlas_core::PaymentStatus::Completed {
            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                amount_cents: order.total_amount_cents,
                payment_method: order.payment_method,
                reference_number: request.reference_number.clone(),
                created_by: user_id.to_string(),
                created_at: now,
            };
            insert_payment(&mut tx, &payment).await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            total_cents = order.total_amount_cents,
            lines = priced.lines.len(),
            "Order placed"
        );

        Ok(order.id)
    }

    /// Gets an order header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, customer_id, user_id,
                total_amount_cents, tax_amount_cents, discount_amount_cents,
                payment_method, payment_status, order_status, notes,
                created_at, updated_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets the full aggregate for an order: header, items, payments.
    pub async fn get_details(&self, id: &str) -> DbResult<Option<OrderDetails>> {
        let Some(order) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let items = self.get_items(id).await?;
        let payments = self.get_payments(id).await?;

        Ok(Some(OrderDetails {
            order,
            items,
            payments,
        }))
    }

    /// Gets all items for an order, in insertion order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT
                id, order_id, product_id, quantity, unit_price_cents,
                discount_amount_cents, tax_amount_cents, subtotal_cents,
                created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all payments for an order.
    pub async fn get_payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, order_id, amount_cents, payment_method,
                reference_number, created_by, created_at
            FROM payments
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Lists recent orders, newest first.
    ///
    /// ## Usage
    /// Dashboard "recent orders" panel.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, customer_id, user_id,
                total_amount_cents, tax_amount_cents, discount_amount_cents,
                payment_method, payment_status, order_status, notes,
                created_at, updated_at
            FROM orders
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Stores an order status transition.
    ///
    /// Gate: `pending → processing → completed`, or `pending → cancelled`.
    /// Cancellation does NOT reverse ledger entries or restore stock; the
    /// ledger records what physically happened at sale time.
    pub async fn update_status(&self, id: &str, next: OrderStatus) -> StoreResult<Order> {
        let order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        if !order.order_status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                order_id: id.to_string(),
                current: format!("{:?}", order.order_status).to_lowercase(),
                requested: format!("{next:?}").to_lowercase(),
            }
            .into());
        }

        let now = Utc::now();

        sqlx::query("UPDATE orders SET order_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(next)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        info!(order_id = %id, status = ?next, "Order status updated");

        Ok(Order {
            order_status: next,
            updated_at: now,
            ..order
        })
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

async fn insert_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_id, user_id,
            total_amount_cents, tax_amount_cents, discount_amount_cents,
            payment_method, payment_status, order_status, notes,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(&order.user_id)
    .bind(order.total_amount_cents)
    .bind(order.tax_amount_cents)
    .bind(order.discount_amount_cents)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.order_status)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_item(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &str,
    line: &PricedLine,
    created_at: chrono::DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, quantity, unit_price_cents,
            discount_amount_cents, tax_amount_cents, subtotal_cents,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(order_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.discount_cents)
    .bind(line.tax_cents)
    .bind(line.subtotal_cents)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Guarded stock decrement.
///
/// ## Returns
/// * `Ok(true)` - stock covered the quantity and was decremented
/// * `Ok(false)` - precondition failed: stock short or row missing
async fn apply_sale_decrement(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity - ?2, updated_at = ?3
        WHERE id = ?1 AND is_active = 1 AND stock_quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Reads live stock for an active product inside the transaction.
async fn current_stock(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
) -> DbResult<Option<i64>> {
    let stock: Option<i64> = sqlx::query_scalar(
        "SELECT stock_quantity FROM products WHERE id = ?1 AND is_active = 1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(stock)
}

async fn insert_payment(tx: &mut Transaction<'_, Sqlite>, payment: &Payment) -> DbResult<()> {
    debug!(order_id = %payment.order_id, amount_cents = payment.amount_cents, "Recording payment");

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, order_id, amount_cents, payment_method,
            reference_number, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(payment.amount_cents)
    .bind(payment.payment_method)
    .bind(&payment.reference_number)
    .bind(&payment.created_by)
    .bind(payment.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
