//! # Seed Data Generator
//!
//! Populates a database with catalog products (and a few demo orders) for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p atlas-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p atlas-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p atlas-db --bin seed -- --db ./data/atlas.db
//! ```
//!
//! Each product is created through the repository, so its initial stock is
//! logged to the inventory ledger exactly like production writes. Demo
//! orders exercise the full order transaction.

use std::env;

use atlas_core::{OrderLineRequest, OrderRequest, PaymentStatus};
use atlas_db::{Database, DbConfig, NewProduct};

/// Product families for realistic test data: (SKU prefix, names).
const FAMILIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Cola 330ml",
            "Cola 1.5L",
            "Orange Soda 330ml",
            "Sparkling Water 500ml",
            "Still Water 1L",
            "Apple Juice 1L",
            "Iced Tea 500ml",
            "Energy Drink 250ml",
            "Cold Brew Coffee 300ml",
            "Lemonade 500ml",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Chips 150g",
            "Tortilla Chips 200g",
            "Chocolate Bar 45g",
            "Gummy Mix 100g",
            "Trail Mix 250g",
            "Butter Cookies 300g",
            "Salted Pretzels 175g",
            "Peanut Pack 90g",
            "Granola Bar 40g",
            "Rice Crackers 120g",
        ],
    ),
    (
        "HSH",
        &[
            "Dish Soap 500ml",
            "Laundry Powder 2kg",
            "Paper Towels 4pk",
            "Trash Bags 30pk",
            "Glass Cleaner 750ml",
            "Sponge 3pk",
            "Aluminium Foil 30m",
            "Batteries AA 8pk",
            "Light Bulb E27",
            "Matches 10pk",
        ],
    ),
    (
        "STA",
        &[
            "Ballpoint Pen 10pk",
            "Notebook A5",
            "Printer Paper 500s",
            "Sticky Notes 6pk",
            "Packing Tape 50m",
            "Envelopes C5 50pk",
            "Permanent Marker",
            "Stapler",
            "Scissors 21cm",
            "Folder A4 25pk",
        ],
    ),
];

/// Tax rates in basis points.
const TAX_RATES: &[u32] = &[0, 500, 825, 1000];

const SEED_USER: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./atlas_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Atlas IMS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./atlas_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Atlas IMS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("* Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("! Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut product_ids = Vec::new();
    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (family_idx, (prefix, names)) in FAMILIES.iter().enumerate() {
        for variant in 0..((count / (FAMILIES.len() * names.len())) + 1) {
            for (name_idx, name) in names.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = family_idx * 10_000 + variant * 100 + name_idx;
                let new = generate_product(prefix, name, variant, seed);

                match db.products().create(&new, SEED_USER).await {
                    Ok(product) => product_ids.push(product.id),
                    Err(e) => {
                        eprintln!("Failed to insert {}: {}", new.sku, e);
                        continue;
                    }
                }

                generated += 1;

                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("* Generated {} products in {:?}", generated, elapsed);

    // A few demo orders so dashboards have something to show
    println!();
    println!("Placing demo orders...");

    let mut placed = 0;
    for chunk in product_ids.chunks(7).take(5) {
        let items: Vec<OrderLineRequest> = chunk
            .iter()
            .enumerate()
            .map(|(idx, id)| OrderLineRequest {
                product_id: id.clone(),
                quantity: (idx as i64 % 3) + 1,
                unit_price_cents: 199 + (idx as i64 * 50),
                discount_cents: None,
                tax_cents: None,
            })
            .collect();

        let request = OrderRequest {
            items,
            payment_status: Some(PaymentStatus::Completed),
            notes: Some("Seed demo order".to_string()),
            ..Default::default()
        };

        match db.orders().create_order(&request, SEED_USER).await {
            Ok(details) => {
                placed += 1;
                println!(
                    "  Order {} total {} ({} lines)",
                    details.order.id,
                    details.order.total_amount(),
                    details.items.len()
                );
            }
            Err(e) => eprintln!("Failed to place demo order: {}", e),
        }
    }

    println!();
    println!("* Placed {} demo orders", placed);

    let low = db.products().low_stock_count().await?;
    println!("* Low-stock products: {}", low);

    println!();
    println!("* Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(prefix: &str, name: &str, variant: usize, seed: usize) -> NewProduct {
    let sku = format!("{}-{:05}", prefix, seed);

    // Price: $0.99 - $20.99 depending on seed
    let selling_price_cents = 99 + ((seed * 37) % 2000) as i64;
    // Cost: 55-80% of selling price
    let purchase_price_cents = selling_price_cents * (55 + (seed % 25) as i64) / 100;
    // Every 7th product carries a discount price
    let discount_price_cents = if seed % 7 == 0 {
        Some(selling_price_cents * 9 / 10)
    } else {
        None
    };

    let tax_rate_bps = TAX_RATES[seed % TAX_RATES.len()];

    // Stock 0-80, reorder level 3-12: some products start below it
    let stock_quantity = ((seed * 13) % 81) as i64;
    let reorder_level = 3 + (seed % 10) as i64;

    let full_name = if variant == 0 {
        name.to_string()
    } else {
        format!("{} (v{})", name, variant + 1)
    };

    NewProduct {
        sku,
        name: full_name,
        description: None,
        purchase_price_cents,
        selling_price_cents,
        discount_price_cents,
        tax_rate_bps,
        stock_quantity,
        reorder_level,
    }
}
