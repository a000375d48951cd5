//! # Error Types
//!
//! Domain-specific error types for atlas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atlas-core errors (this file)                                         │
//! │  ├── CoreError        - Order intake / business rule failures          │
//! │  └── ValidationError  - Field-level input validation failures          │
//! │                                                                         │
//! │  atlas-db errors (separate crate)                                      │
//! │  ├── DbError          - Storage operation failures                     │
//! │  └── OrderError       - Everything the order executor can surface      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OrderError → API layer            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, quantities)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised while taking in an order.
///
/// Any of these aborts the whole order; the caller never sees a
/// partially-applied request.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The order request carried no line items.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - Product ID doesn't exist
    /// - Product was soft-deleted (is_active = false)
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to fill a line.
    ///
    /// ## When This Occurs
    /// - Requested quantity exceeds the live stock_quantity,
    ///   either at intake or at the authoritative in-transaction check
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Order is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Moving a completed or cancelled order anywhere
    /// - Moving a processing order backwards to pending
    #[error("Order {order_id} is {current}, cannot transition to {requested}")]
    InvalidStatusTransition {
        order_id: String,
        current: String,
        requested: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level input validation errors.
///
/// These occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
