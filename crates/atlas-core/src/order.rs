//! # Order Intake
//!
//! Request types and pure pricing/validation for order placement.
//!
//! ## Intake Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Intake                                      │
//! │                                                                         │
//! │  OrderRequest { items: [OrderLineRequest], payment, notes, ... }       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_order(items, catalog lookup) ← THIS MODULE (read-only)          │
//! │       │                                                                 │
//! │       ├── unknown / inactive product → ProductNotFound                 │
//! │       ├── quantity > live stock      → InsufficientStock               │
//! │       ├── no items                   → EmptyOrder                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PricedOrder { lines + aggregate totals }                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Transaction executor (atlas-db) re-runs this against live rows        │
//! │  inside the transaction, then writes order/items/ledger/payment        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pricing here has no side effects: the stock check is advisory (against the
//! rows the caller fetched). The guarded decrement in the executor is the
//! authoritative enforcement of non-negative stock.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{OrderStatus, PaymentMethod, PaymentStatus, Product};
use crate::validation::{validate_line_count, validate_line_quantity, validate_price_cents};

// =============================================================================
// Request Types
// =============================================================================

/// One requested order line, as submitted by the caller.
///
/// `unit_price_cents` is caller-supplied (the API layer decides whether to
/// honor catalog or negotiated pricing); it is frozen into the order item.
/// `discount_cents` and `tax_cents` are optional overrides; tax defaults to
/// the product's tax rate applied to the line total, discount defaults to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_cents: Option<i64>,
    #[serde(default)]
    pub tax_cents: Option<i64>,
}

/// A full order-creation request.
///
/// The acting user is NOT part of the request; authentication is the
/// caller's concern and the user id arrives as a separate argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
    /// External payment reference (terminal auth code, transfer id).
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Priced Results
// =============================================================================

/// One validated, fully priced order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    /// SKU snapshot, for error messages and receipts.
    pub sku: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit_price, before tax/discount adjustment.
    pub line_total_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// line_total − discount + tax.
    pub subtotal_cents: i64,
}

/// A validated line set plus aggregate totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    /// Σ line_total (the pre-tax/discount base).
    pub total_amount_cents: i64,
    /// Σ per-line tax.
    pub tax_amount_cents: i64,
    /// Σ per-line discount.
    pub discount_amount_cents: i64,
}

// =============================================================================
// Pricing / Validation
// =============================================================================

/// Validates and prices requested lines against catalog rows.
///
/// ## Contract
/// - Read-only: no side effects, deterministic for a given catalog view.
/// - `lookup` resolves a product id to its current ACTIVE catalog row;
///   `None` means unknown or soft-deleted.
/// - Duplicate product ids are priced as independent lines; each is checked
///   against the live, not-yet-decremented stock value.
///
/// ## Errors
/// - `EmptyOrder` for an empty line list
/// - `ProductNotFound` for an unknown/inactive product id
/// - `InsufficientStock` when a line exceeds current stock
/// - `Validation` for malformed fields (quantity, prices, line count)
pub fn price_order<'a, F>(items: &[OrderLineRequest], mut lookup: F) -> CoreResult<PricedOrder>
where
    F: FnMut(&str) -> Option<&'a Product>,
{
    if items.is_empty() {
        return Err(CoreError::EmptyOrder);
    }

    validate_line_count(items.len())?;

    let mut lines = Vec::with_capacity(items.len());
    let mut total_amount = Money::zero();
    let mut tax_amount = Money::zero();
    let mut discount_amount = Money::zero();

    for item in items {
        validate_line_quantity(item.quantity)?;
        validate_price_cents("unit_price", item.unit_price_cents)?;
        if let Some(discount) = item.discount_cents {
            validate_price_cents("discount_amount", discount)?;
        }
        if let Some(tax) = item.tax_cents {
            validate_price_cents("tax_amount", tax)?;
        }

        let product = lookup(&item.product_id)
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

        if !product.has_stock(item.quantity) {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.stock_quantity,
                requested: item.quantity,
            });
        }

        let unit_price = Money::from_cents(item.unit_price_cents);
        let line_total = unit_price.multiply_quantity(item.quantity);
        let discount = Money::from_cents(item.discount_cents.unwrap_or(0));
        let tax = match item.tax_cents {
            Some(cents) => Money::from_cents(cents),
            None => line_total.calculate_tax(product.tax_rate()),
        };
        let subtotal = line_total - discount + tax;

        total_amount += line_total;
        tax_amount += tax;
        discount_amount += discount;

        lines.push(PricedLine {
            product_id: item.product_id.clone(),
            sku: product.sku.clone(),
            quantity: item.quantity,
            unit_price_cents: unit_price.cents(),
            line_total_cents: line_total.cents(),
            discount_cents: discount.cents(),
            tax_cents: tax.cents(),
            subtotal_cents: subtotal.cents(),
        });
    }

    Ok(PricedOrder {
        lines,
        total_amount_cents: total_amount.cents(),
        tax_amount_cents: tax_amount.cents(),
        discount_amount_cents: discount_amount.cents(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn product(id: &str, sku: &str, stock: i64, tax_bps: u32) -> Product {
        Product {
            id: id.to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            purchase_price_cents: 600,
            selling_price_cents: 1000,
            discount_price_cents: None,
            tax_rate_bps: tax_bps,
            stock_quantity: stock,
            reorder_level: 5,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<String, Product> {
        products.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> OrderLineRequest {
        OrderLineRequest {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents,
            discount_cents: None,
            tax_cents: None,
        }
    }

    #[test]
    fn test_empty_order_rejected() {
        let catalog = catalog(vec![]);
        let result = price_order(&[], |id| catalog.get(id));
        assert!(matches!(result, Err(CoreError::EmptyOrder)));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let catalog = catalog(vec![product("p1", "A-1", 10, 0)]);
        let result = price_order(&[line("missing", 1, 100)], |id| catalog.get(id));
        assert!(matches!(result, Err(CoreError::ProductNotFound(id)) if id == "missing"));
    }

    #[test]
    fn test_insufficient_stock_rejected() {
        let catalog = catalog(vec![product("p1", "A-1", 5, 0)]);
        let result = price_order(&[line("p1", 6, 100)], |id| catalog.get(id));
        match result {
            Err(CoreError::InsufficientStock {
                sku,
                available,
                requested,
            }) => {
                assert_eq!(sku, "A-1");
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_stock_accepted() {
        let catalog = catalog(vec![product("p1", "A-1", 10, 0)]);
        let priced = price_order(&[line("p1", 10, 250)], |id| catalog.get(id)).unwrap();
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.total_amount_cents, 2500);
    }

    #[test]
    fn test_tax_defaults_to_product_rate() {
        // $10.00 × 2 at 8.25% → tax 165 cents
        let catalog = catalog(vec![product("p1", "A-1", 10, 825)]);
        let priced = price_order(&[line("p1", 2, 1000)], |id| catalog.get(id)).unwrap();
        let l = &priced.lines[0];
        assert_eq!(l.line_total_cents, 2000);
        assert_eq!(l.tax_cents, 165);
        assert_eq!(l.discount_cents, 0);
        assert_eq!(l.subtotal_cents, 2165);
        assert_eq!(priced.tax_amount_cents, 165);
    }

    #[test]
    fn test_caller_overrides_tax_and_discount() {
        let catalog = catalog(vec![product("p1", "A-1", 10, 825)]);
        let request = OrderLineRequest {
            product_id: "p1".to_string(),
            quantity: 2,
            unit_price_cents: 1000,
            discount_cents: Some(200),
            tax_cents: Some(50),
        };
        let priced = price_order(&[request], |id| catalog.get(id)).unwrap();
        let l = &priced.lines[0];
        assert_eq!(l.tax_cents, 50);
        assert_eq!(l.discount_cents, 200);
        // 2000 − 200 + 50
        assert_eq!(l.subtotal_cents, 1850);
        // Aggregate base total stays pre-tax/discount
        assert_eq!(priced.total_amount_cents, 2000);
        assert_eq!(priced.discount_amount_cents, 200);
    }

    #[test]
    fn test_aggregates_across_lines() {
        let catalog = catalog(vec![
            product("p1", "A-1", 10, 1000),
            product("p2", "B-2", 10, 0),
        ]);
        let priced = price_order(
            &[line("p1", 1, 1000), line("p2", 3, 500)],
            |id| catalog.get(id),
        )
        .unwrap();

        assert_eq!(priced.total_amount_cents, 1000 + 1500);
        assert_eq!(priced.tax_amount_cents, 100); // 10% of 1000
        assert_eq!(priced.discount_amount_cents, 0);
    }

    #[test]
    fn test_duplicate_lines_checked_against_live_stock() {
        // Two lines of 6 against stock 10: each passes individually here.
        // The executor's guarded decrement is what stops the second line.
        let catalog = catalog(vec![product("p1", "A-1", 10, 0)]);
        let priced = price_order(
            &[line("p1", 6, 100), line("p1", 6, 100)],
            |id| catalog.get(id),
        )
        .unwrap();
        assert_eq!(priced.lines.len(), 2);
    }

    #[test]
    fn test_invalid_quantities_rejected() {
        let catalog = catalog(vec![product("p1", "A-1", 10, 0)]);
        assert!(price_order(&[line("p1", 0, 100)], |id| catalog.get(id)).is_err());
        assert!(price_order(&[line("p1", -2, 100)], |id| catalog.get(id)).is_err());
        assert!(price_order(&[line("p1", 1, -100)], |id| catalog.get(id)).is_err());
    }

    #[test]
    fn test_too_many_lines_rejected() {
        let catalog = catalog(vec![product("p1", "A-1", 1000, 0)]);
        let items: Vec<_> = (0..crate::MAX_ORDER_LINES + 1)
            .map(|_| line("p1", 1, 100))
            .collect();
        let result = price_order(&items, |id| catalog.get(id));
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
