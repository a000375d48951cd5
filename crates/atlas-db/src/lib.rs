//! # atlas-db: Database Layer for Atlas IMS
//!
//! This crate provides database access for the Atlas IMS core.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Atlas IMS Data Flow                              │
//! │                                                                         │
//! │  Caller (API layer, excluded collaborator)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     atlas-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ 001_init.sql │  │   │
//! │  │   │ Management    │    │ InventoryRepo │    │ ...          │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and repository error types
//! - [`repository`] - Repository implementations (product, order, inventory)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atlas_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/atlas.db")).await?;
//!
//! // Place an order (one transaction: items, stock, ledger, payment)
//! let details = db.orders().create_order(&request, "user-1").await?;
//!
//! // Ledger reads
//! let trail = db.inventory_log().history(&product_id, 50).await?;
//! assert_eq!(db.inventory_log().stock_drift(&product_id).await?, 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, StoreError, StoreResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::inventory::InventoryLogRepository;
pub use repository::order::{OrderDetails, OrderRepository};
pub use repository::product::{NewProduct, ProductRepository};
