//! Integration flow: catalog setup → order placement → ledger verification.
//!
//! Each test builds an isolated database (in-memory, or a temp file for the
//! concurrency case) and drives the public repository surface end to end.

use atlas_core::{
    CoreError, InventoryChangeType, OrderLineRequest, OrderRequest, OrderStatus, PaymentMethod,
    PaymentStatus, Product,
};
use atlas_db::{Database, DbConfig, NewProduct, StoreError};

async fn setup() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

async fn seed_product(db: &Database, sku: &str, stock: i64, tax_rate_bps: u32) -> Product {
    db.products()
        .create(
            &NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                description: None,
                purchase_price_cents: 600,
                selling_price_cents: 1000,
                discount_price_cents: None,
                tax_rate_bps,
                stock_quantity: stock,
                reorder_level: 5,
            },
            "tester",
        )
        .await
        .expect("seed product")
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

fn request(items: Vec<OrderLineRequest>) -> OrderRequest {
    OrderRequest {
        items,
        ..Default::default()
    }
}

async fn table_count(db: &Database, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await
        .expect("count query")
}

// Scenario: stock 10, order 10 → succeeds, stock 0, one sale entry of −10.
#[tokio::test]
async fn order_for_exact_stock_drains_product() {
    let db = setup().await;
    let product = seed_product(&db, "WID-100", 10, 0).await;

    let details = db
        .orders()
        .create_order(&request(vec![line(&product.id, 10, 250)]), "cashier-1")
        .await
        .expect("order should commit");

    assert_eq!(details.order.total_amount_cents, 2500);
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].quantity, 10);

    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 0);

    // Ledger: initial +10 adjustment, then one −10 sale tied to the order
    let history = db.inventory_log().history(&product.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    let sale = &history[0];
    assert_eq!(sale.quantity_change, -10);
    assert_eq!(sale.change_type, InventoryChangeType::Sale);
    assert_eq!(sale.reference_id.as_deref(), Some(details.order.id.as_str()));

    assert_eq!(db.inventory_log().stock_drift(&product.id).await.unwrap(), 0);
}

// Scenario: stock 5, order 6 → fails; stock remains 5; no rows created.
#[tokio::test]
async fn insufficient_stock_rolls_back_everything() {
    let db = setup().await;
    let product = seed_product(&db, "WID-200", 5, 0).await;

    let err = db
        .orders()
        .create_order(&request(vec![line(&product.id, 6, 250)]), "cashier-1")
        .await
        .expect_err("order must fail");

    match err {
        StoreError::Core(CoreError::InsufficientStock {
            sku,
            available,
            requested,
        }) => {
            assert_eq!(sku, "WID-200");
            assert_eq!(available, 5);
            assert_eq!(requested, 6);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 5);

    assert_eq!(table_count(&db, "orders").await, 0);
    assert_eq!(table_count(&db, "order_items").await, 0);
    assert_eq!(table_count(&db, "payments").await, 0);
    // Only the creation-time adjustment entry exists
    assert_eq!(db.inventory_log().history(&product.id, 10).await.unwrap().len(), 1);
}

// Scenario: two lines, one valid one unknown → entire order fails,
// neither product's stock changes.
#[tokio::test]
async fn unknown_product_fails_whole_order() {
    let db = setup().await;
    let product = seed_product(&db, "WID-300", 10, 0).await;

    let err = db
        .orders()
        .create_order(
            &request(vec![
                line(&product.id, 2, 250),
                line("00000000-0000-0000-0000-000000000000", 1, 100),
            ]),
            "cashier-1",
        )
        .await
        .expect_err("order must fail");

    assert!(matches!(
        err,
        StoreError::Core(CoreError::ProductNotFound(_))
    ));

    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 10);

    assert_eq!(table_count(&db, "orders").await, 0);
    assert_eq!(table_count(&db, "order_items").await, 0);
}

// Scenario: payment_status = completed → exactly one Payment row with
// amount == order.total_amount.
#[tokio::test]
async fn completed_payment_writes_one_payment_row() {
    let db = setup().await;
    let product = seed_product(&db, "WID-400", 20, 0).await;

    let mut req = request(vec![line(&product.id, 4, 500)]);
    req.payment_method = Some(PaymentMethod::Card);
    req.payment_status = Some(PaymentStatus::Completed);
    req.reference_number = Some("AUTH-123".to_string());

    let details = db
        .orders()
        .create_order(&req, "cashier-1")
        .await
        .expect("order should commit");

    assert_eq!(details.payments.len(), 1);
    let payment = &details.payments[0];
    assert_eq!(payment.amount_cents, details.order.total_amount_cents);
    assert_eq!(payment.payment_method, PaymentMethod::Card);
    assert_eq!(payment.reference_number.as_deref(), Some("AUTH-123"));
    assert_eq!(payment.created_by, "cashier-1");

    assert_eq!(table_count(&db, "payments").await, 1);
}

#[tokio::test]
async fn pending_payment_writes_no_payment_row() {
    let db = setup().await;
    let product = seed_product(&db, "WID-450", 20, 0).await;

    let details = db
        .orders()
        .create_order(&request(vec![line(&product.id, 1, 500)]), "cashier-1")
        .await
        .expect("order should commit");

    assert_eq!(details.order.payment_status, PaymentStatus::Pending);
    assert!(details.payments.is_empty());
    assert_eq!(table_count(&db, "payments").await, 0);
}

// Total correctness and idempotent read-back across multiple lines.
#[tokio::test]
async fn totals_match_lines_and_readback_is_consistent() {
    let db = setup().await;
    let alpha = seed_product(&db, "ALP-100", 50, 1000).await; // 10% tax
    let beta = seed_product(&db, "BET-200", 50, 0).await;

    let mut req = request(vec![line(&alpha.id, 3, 1000), line(&beta.id, 2, 750)]);
    req.items[1].discount_cents = Some(100);

    let details = db
        .orders()
        .create_order(&req, "cashier-2")
        .await
        .expect("order should commit");

    // Base total is Σ quantity × unit_price, before tax/discount
    assert_eq!(details.order.total_amount_cents, 3 * 1000 + 2 * 750);
    // Tax: 10% of 3000 on the alpha line only
    assert_eq!(details.order.tax_amount_cents, 300);
    assert_eq!(details.order.discount_amount_cents, 100);

    // Per-line subtotal = line_total − discount + tax
    assert_eq!(details.items[0].subtotal_cents, 3000 + 300);
    assert_eq!(details.items[1].subtotal_cents, 1500 - 100);

    // Reading the order back returns the same aggregate
    let read_back = db
        .orders()
        .get_details(&details.order.id)
        .await
        .unwrap()
        .expect("order exists");
    assert_eq!(read_back.order.total_amount_cents, details.order.total_amount_cents);
    assert_eq!(read_back.items.len(), details.items.len());
    assert_eq!(read_back.payments.len(), details.payments.len());

    let sale_entries = db
        .inventory_log()
        .by_reference(&details.order.id)
        .await
        .unwrap();
    assert_eq!(sale_entries.len(), 2);
    assert!(sale_entries.iter().all(|e| e.quantity_change < 0));
}

// Duplicate product ids are independent lines; the guarded decrement stops
// the second one once live stock is drained.
#[tokio::test]
async fn duplicate_lines_cannot_oversell() {
    let db = setup().await;
    let product = seed_product(&db, "WID-500", 10, 0).await;

    let err = db
        .orders()
        .create_order(
            &request(vec![line(&product.id, 6, 250), line(&product.id, 6, 250)]),
            "cashier-1",
        )
        .await
        .expect_err("second line must fail");

    match err {
        StoreError::Core(CoreError::InsufficientStock { available, requested, .. }) => {
            assert_eq!(available, 4);
            assert_eq!(requested, 6);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Whole order rolled back, including the first line's decrement
    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 10);
    assert_eq!(table_count(&db, "orders").await, 0);
}

// Pre-flight pricing is advisory and writes nothing.
#[tokio::test]
async fn price_order_preflight_writes_nothing() {
    let db = setup().await;
    let product = seed_product(&db, "PRE-100", 8, 825).await;

    let priced = db
        .orders()
        .price_order(&[line(&product.id, 2, 1000)])
        .await
        .expect("pricing should succeed");

    assert_eq!(priced.total_amount_cents, 2000);
    assert_eq!(priced.tax_amount_cents, 165); // 8.25% of $20.00
    assert_eq!(priced.lines[0].sku, "PRE-100");

    // Nothing was written; stock untouched
    assert_eq!(table_count(&db, "orders").await, 0);
    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 8);

    // An over-ask is caught here too, read-only
    let err = db
        .orders()
        .price_order(&[line(&product.id, 9, 1000)])
        .await
        .expect_err("over-ask must fail");
    assert!(matches!(
        err,
        StoreError::Core(CoreError::InsufficientStock { .. })
    ));
}

// Catalog surface: sku lookup, update rules, listing.
#[tokio::test]
async fn catalog_roundtrip_and_recent_orders() {
    let db = setup().await;
    let product = seed_product(&db, "CAT-100", 12, 0).await;

    let mut fetched = db
        .products()
        .get_by_sku("CAT-100")
        .await
        .unwrap()
        .expect("sku lookup");
    assert_eq!(fetched.id, product.id);

    // Catalog edit: price and reorder level change, stock untouched
    fetched.name = "Renamed Widget".to_string();
    fetched.selling_price_cents = 1250;
    fetched.reorder_level = 2;
    db.products().update(&fetched).await.expect("update");

    let listed = db.products().list_active(10).await.unwrap();
    assert!(listed.iter().any(|p| p.name == "Renamed Widget"));
    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 12);
    assert_eq!(after.selling_price_cents, 1250);

    let details = db
        .orders()
        .create_order(&request(vec![line(&product.id, 1, 1250)]), "cashier-1")
        .await
        .unwrap();

    let recent = db.orders().list_recent(5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, details.order.id);
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let db = setup().await;

    let err = db
        .orders()
        .create_order(&request(vec![]), "cashier-1")
        .await
        .expect_err("empty order must fail");

    assert!(matches!(err, StoreError::Core(CoreError::EmptyOrder)));
    assert_eq!(table_count(&db, "orders").await, 0);
}

#[tokio::test]
async fn soft_deleted_product_is_not_orderable() {
    let db = setup().await;
    let product = seed_product(&db, "WID-600", 5, 0).await;
    db.products().soft_delete(&product.id).await.unwrap();

    let err = db
        .orders()
        .create_order(&request(vec![line(&product.id, 1, 250)]), "cashier-1")
        .await
        .expect_err("inactive product must not sell");

    assert!(matches!(
        err,
        StoreError::Core(CoreError::ProductNotFound(_))
    ));
}

// Ledger consistency across every writer path: creation, restock,
// stocktake adjustment, sale.
#[tokio::test]
async fn ledger_stays_consistent_across_writer_paths() {
    let db = setup().await;
    let product = seed_product(&db, "WID-700", 20, 0).await;

    db.products()
        .restock(&product.id, 15, "stockroom", Some("PO-77"), None)
        .await
        .expect("restock");

    db.products()
        .set_stock(&product.id, 30, "stockroom", Some("Stocktake correction"))
        .await
        .expect("stocktake");

    db.orders()
        .create_order(&request(vec![line(&product.id, 12, 250)]), "cashier-1")
        .await
        .expect("order");

    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 18);

    // stock_quantity must equal Σ quantity_change at every point
    assert_eq!(db.inventory_log().net_change(&product.id).await.unwrap(), 18);
    assert_eq!(db.inventory_log().stock_drift(&product.id).await.unwrap(), 0);

    let history = db.inventory_log().history(&product.id, 10).await.unwrap();
    assert_eq!(history.len(), 4);
    let types: Vec<InventoryChangeType> = history.iter().map(|e| e.change_type).collect();
    assert_eq!(
        types,
        vec![
            InventoryChangeType::Sale,
            InventoryChangeType::Adjustment,
            InventoryChangeType::Restock,
            InventoryChangeType::Adjustment,
        ]
    );
}

#[tokio::test]
async fn low_stock_listing_tracks_reorder_level() {
    let db = setup().await;
    let low = seed_product(&db, "LOW-100", 4, 0).await; // reorder level 5
    let healthy = seed_product(&db, "OK-100", 40, 0).await;

    let listed = db.products().low_stock(10).await.unwrap();
    assert!(listed.iter().any(|p| p.id == low.id));
    assert!(listed.iter().all(|p| p.id != healthy.id));
    assert_eq!(db.products().low_stock_count().await.unwrap(), 1);

    // Selling down to zero keeps it listed, lowest stock first
    db.orders()
        .create_order(&request(vec![line(&low.id, 4, 100)]), "cashier-1")
        .await
        .unwrap();
    let listed = db.products().low_stock(10).await.unwrap();
    assert_eq!(listed[0].id, low.id);
    assert_eq!(listed[0].stock_quantity, 0);
}

#[tokio::test]
async fn status_transitions_follow_state_machine() {
    let db = setup().await;
    let product = seed_product(&db, "WID-800", 10, 0).await;

    let details = db
        .orders()
        .create_order(&request(vec![line(&product.id, 1, 250)]), "cashier-1")
        .await
        .unwrap();
    let order_id = details.order.id;

    let order = db
        .orders()
        .update_status(&order_id, OrderStatus::Processing)
        .await
        .expect("pending → processing");
    assert_eq!(order.order_status, OrderStatus::Processing);

    let order = db
        .orders()
        .update_status(&order_id, OrderStatus::Completed)
        .await
        .expect("processing → completed");
    assert_eq!(order.order_status, OrderStatus::Completed);

    let err = db
        .orders()
        .update_status(&order_id, OrderStatus::Cancelled)
        .await
        .expect_err("completed is terminal");
    assert!(matches!(
        err,
        StoreError::Core(CoreError::InvalidStatusTransition { .. })
    ));

    // Cancellation does not touch the ledger
    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 9);
}

// Scenario: two concurrent orders of 6 against stock 10 → exactly one
// commits (final stock 4); the loser fails typed; stock never negative.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_cannot_oversell() {
    let path = std::env::temp_dir().join(format!("atlas-flow-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(4))
        .await
        .expect("file-backed database");

    let product = seed_product(&db, "RACE-100", 10, 0).await;

    let db_a = db.clone();
    let db_b = db.clone();
    let id_a = product.id.clone();
    let id_b = product.id.clone();

    let task_a = tokio::spawn(async move {
        db_a.orders()
            .create_order(&request(vec![line(&id_a, 6, 250)]), "cashier-a")
            .await
    });
    let task_b = tokio::spawn(async move {
        db_b.orders()
            .create_order(&request(vec![line(&id_b, 6, 250)]), "cashier-b")
            .await
    });

    let result_a = task_a.await.expect("task a");
    let result_b = task_b.await.expect("task b");

    let successes = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(successes, 1, "exactly one order must commit");

    for result in [result_a, result_b] {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    StoreError::Conflict
                        | StoreError::Core(CoreError::InsufficientStock { .. })
                ),
                "loser must fail typed, got {err:?}"
            );
        }
    }

    let after = db
        .products()
        .get_by_id(&product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.stock_quantity, 4);
    assert!(after.stock_quantity >= 0);
    assert_eq!(db.inventory_log().stock_drift(&product.id).await.unwrap(), 0);

    db.close().await;
    let _ = std::fs::remove_file(&path);
}
