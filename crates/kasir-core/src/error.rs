//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                         │
//! │  ├── CoreError        - Sale/refund outcomes the caller must handle    │
//! │  │   ├── Validation         → 400                                      │
//! │  │   ├── InsufficientStock  → 400                                      │
//! │  │   ├── NotFound           → 404                                      │
//! │  │   └── StorageConflict    → 409                                      │
//! │  └── ValidationError  - Input / reference validation failures          │
//! │                                                                         │
//! │  kasir-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── SaleError        - CoreError | DbError, returned by SaleService   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SaleError → HTTP status code      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, id, quantities)
//! 3. Errors are enum variants, never String
//! 4. Every variant maps to exactly one status class

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input, or a referenced product/customer is missing or inactive.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Business-rule rejection: not enough stock to cover a line.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout: Teh Botol x5
    ///      │
    ///      ▼
    /// Check stock: available=2
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Teh Botol", available: 2, requested: 5 }
    ///      │
    ///      ▼
    /// Dashboard shows: "Only 2 Teh Botol in stock", cashier adjusts qty
    /// ```
    #[error("Insufficient stock for {product}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A transaction (or other entity looked up by id) does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Concurrent modification kept aborting the unit of work.
    ///
    /// ## When This Occurs
    /// - Two checkouts fight over the same product row and the bounded
    ///   retry budget is exhausted
    /// - Two sales on the same day raced for the same transaction number
    #[error("Concurrent modification detected, gave up after {attempts} attempts")]
    StorageConflict { attempts: u32 },
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// HTTP-equivalent status class for the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) | CoreError::InsufficientStock { .. } => 400,
            CoreError::NotFound { .. } => 404,
            CoreError::StorageConflict { .. } => 409,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are raised before any write happens, or from inside a unit of work
/// when a referenced row turns out to be missing (which aborts it).
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., bad decimal amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// At least one cart line references an unknown or deactivated product.
    #[error("Some products not found or inactive")]
    ProductsUnavailable { missing: Vec<String> },

    /// The customer attached to a sale does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Amount arithmetic overflowed the fixed-point range.
    #[error("{field} is too large")]
    AmountOverflow { field: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn overflow(field: impl Into<String>) -> Self {
        ValidationError::AmountOverflow {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
