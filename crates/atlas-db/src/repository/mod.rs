//! # Repository Module
//!
//! Database repository implementations for Atlas IMS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Caller (API layer, excluded)                                          │
//! │       │                                                                 │
//! │       │  db.orders().create_order(&request, user_id)                   │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── price_order(&self, items)        read-only pre-flight             │
//! │  ├── create_order(&self, request, ..) one transaction, all-or-nothing  │
//! │  └── get_details(&self, id)           read-back aggregate              │
//! │       │                                                                 │
//! │       │  SQL (one transaction per mutating call)                       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Rule: every write to products.stock_quantity happens inside a         │
//! │  transaction that also appends the matching inventory_log entry.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, stock movements, low-stock queries
//! - [`order::OrderRepository`] - Order placement transaction and reads
//! - [`inventory::InventoryLogRepository`] - Ledger history and audit reads

pub mod inventory;
pub mod order;
pub mod product;
