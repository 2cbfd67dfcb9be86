//! # kasir-core: Pure Business Logic for Kasir
//!
//! This crate is the **heart** of Kasir. It contains the sale-processing
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               HTTP layer / dashboard (outside this repo)        │   │
//! │  │    createSale ──► getSaleById ──► setSaleStatus ──► reports     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         kasir-db: SaleService, repositories, stock ledger       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  builder  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  Draft    │  │   rules   │  │   │
//! │  │   │Transaction│  │  parsing  │  │  numbering│  │  payloads │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Transaction, line items)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`input`] - Request payloads, partial updates, filters, pagination
//! - [`builder`] - Transaction Builder and transaction numbering
//! - [`stock`] - Availability checks and stock deltas
//! - [`report`] - Read-only report shapes
//! - [`error`] - Domain error types
//! - [`validation`] - Payload validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use kasir_core::builder::TransactionBuilder;
//! use kasir_core::input::{CartItem, CreateSaleRequest};
//! use kasir_core::{Money, Product};
//!
//! let kopi = Product {
//!     id: "p-1".into(),
//!     category_id: None,
//!     sku: "KOPI-01".into(),
//!     barcode: None,
//!     name: "Kopi Susu".into(),
//!     description: None,
//!     price_cents: 10_000,
//!     cost_cents: None,
//!     stock: 10,
//!     min_stock: 5,
//!     is_active: true,
//!     created_at: Utc::now(),
//!     updated_at: Utc::now(),
//! };
//!
//! let products = [kopi];
//! let request = CreateSaleRequest::cash(vec![CartItem::new("p-1", 3)]);
//! let draft = TransactionBuilder::new(&products).build(&request).unwrap();
//!
//! assert_eq!(draft.total, Money::from_cents(30_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod builder;
pub mod error;
pub mod input;
pub mod money;
pub mod report;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use kasir_core::Money` instead of
// `use kasir_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Generates a new entity identifier (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
