//! # Domain Types
//!
//! Core domain types used throughout Atlas IMS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  payment_status │   │  order_id (FK)  │       │
//! │  │  stock_quantity │   │  order_status   │   │  method         │       │
//! │  │  reorder_level  │   │  total_amount   │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌────────────────┐   │
//! │  │   OrderItem     │   │  InventoryLogEntry   │   │    TaxRate     │   │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ────────────  │   │
//! │  │  order_id (FK)  │   │  quantity_change (±) │   │  bps (u32)     │   │
//! │  │  price snapshot │   │  change_type         │   │  825 = 8.25%   │   │
//! │  │  subtotal       │   │  reference_id        │   └────────────────┘   │
//! │  └─────────────────┘   └──────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (sku) - human-readable
//!
//! ## Ledger Invariant
//! `Product.stock_quantity` is a cached projection: for any product it must
//! equal the sum of all `InventoryLogEntry.quantity_change` rows for it.
//! Initial stock is itself written as an `adjustment` entry at creation, so
//! the baseline is zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 825 bps = 8.25% (e.g., Texas sales tax)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Stock Level
// =============================================================================

/// Classification of a product's stock position against its reorder level.
///
/// ## Thresholds
/// - `Out`: stock_quantity <= 0
/// - `Low`: stock_quantity <= reorder_level
/// - `InStock`: everything above the reorder level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    InStock,
    Low,
    Out,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique and immutable
    /// once assigned.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Purchase (cost) price in cents.
    pub purchase_price_cents: i64,

    /// Selling price in cents.
    pub selling_price_cents: i64,

    /// Optional discounted selling price in cents.
    pub discount_price_cents: Option<i64>,

    /// Tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,

    /// Current stock level. Never negative after a committed transaction.
    pub stock_quantity: i64,

    /// Threshold at or below which the product counts as low stock.
    pub reorder_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Returns the price a sale would use: the discount price when one is
    /// set, the selling price otherwise.
    #[inline]
    pub fn effective_price(&self) -> Money {
        Money::from_cents(self.discount_price_cents.unwrap_or(self.selling_price_cents))
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Checks whether current stock covers the requested quantity.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }

    /// Classifies the stock position against the reorder level.
    pub fn stock_level(&self) -> StockLevel {
        if self.stock_quantity <= 0 {
            StockLevel::Out
        } else if self.stock_quantity <= self.reorder_level {
            StockLevel::Low
        } else {
            StockLevel::InStock
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The fulfillment status of an order.
///
/// ## State Machine
/// ```text
/// pending ──► processing ──► completed
///    │
///    └──────► cancelled
/// ```
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been placed but not picked up for fulfillment.
    Pending,
    /// Order is being fulfilled.
    Processing,
    /// Order has been fulfilled.
    Completed,
    /// Order was cancelled before completion.
    Cancelled,
}

impl OrderStatus {
    /// Whether this status permits no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Checks a status transition against the state machine.
    ///
    /// Ledger entries are NOT reversed on cancellation; this gate only
    /// covers what may be stored in `order_status`.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Completed)
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// The payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment has not been collected yet.
    Pending,
    /// Payment was collected in full. A Payment row exists for the order.
    Completed,
    /// Payment was attempted and failed.
    Failed,
    /// Payment was returned to the customer.
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Direct bank transfer.
    BankTransfer,
    /// Mobile wallet payment.
    Mobile,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order header.
///
/// Immutable once committed, except `order_status` transitions.
/// `total_amount_cents` is the sum of line totals (quantity × unit price)
/// at creation time; tax and discount aggregates are carried separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Customer reference, when the sale is attributed to one.
    pub customer_id: Option<String>,
    /// The user who created the order.
    pub user_id: String,
    pub total_amount_cents: i64,
    pub tax_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern: the unit price is frozen at time of sale,
/// independent of later catalog price changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Quantity sold. Always > 0.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Discount applied to this line.
    pub discount_amount_cents: i64,
    /// Tax for this line.
    pub tax_amount_cents: i64,
    /// quantity × unit_price − discount + tax.
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total before tax/discount adjustment.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Inventory Log Entry
// =============================================================================

/// The kind of event that produced a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum InventoryChangeType {
    /// Stock left the building with an order. Always negative.
    Sale,
    /// Manual correction (stocktake, initial stock, shrinkage). Either sign.
    Adjustment,
    /// Supplier delivery. Always positive.
    Restock,
}

/// One append-only entry in the inventory ledger.
///
/// The ledger is the source of truth for stock history; any write to
/// `products.stock_quantity` without an accompanying entry is a
/// data-integrity bug.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryLogEntry {
    pub id: String,
    pub product_id: String,
    /// The acting user.
    pub user_id: String,
    /// Signed delta: negative for sales, positive for restock/adjustment up.
    pub quantity_change: i64,
    pub change_type: InventoryChangeType,
    /// Originating event, e.g. the order id for a sale.
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment recorded against an order.
/// Written only when an order is created with payment_status = completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    /// Amount paid in cents. Equals the order total.
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    /// External reference (terminal auth code, transfer id, etc.).
    pub reference_number: Option<String>,
    /// The user who recorded the payment.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
