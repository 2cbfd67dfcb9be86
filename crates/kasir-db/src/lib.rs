//! # kasir-db: Storage and Sale Orchestration for Kasir
//!
//! SQLite access through sqlx, plus the one place where sales and refunds
//! move stock and customer totals.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kasir Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (createSale / getSaleById / setSaleStatus / dashboard)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kasir-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │  SaleService  │──►│  UnitOfWork   │──►│    ledger     │    │   │
//! │  │   │  (service.rs) │   │ BEGIN IMMED.  │   │ stock deltas  │    │   │
//! │  │   │  retry policy │   │ commit / roll │   │ customer sums │    │   │
//! │  │   └───────────────┘   └───────────────┘   └───────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │   Database    │   │ Repositories  │   │  Migrations   │    │   │
//! │  │   │   (pool.rs)   │   │ product, ...  │   │  (embedded)   │    │   │
//! │  │   └───────────────┘   └───────────────┘   └───────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── kasir.db                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and embedded migrations
//! - [`config`] - Environment-driven process configuration
//! - [`error`] - Database and sale error types
//! - [`unit_of_work`] - Write transactions
//! - [`ledger`] - Stock and customer-total movements
//! - [`service`] - The sale orchestrator
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_core::input::{CartItem, CreateSaleRequest};
//! use kasir_db::{Database, KasirConfig};
//!
//! let config = KasirConfig::from_env()?;
//! let db = Database::new(config.database).await?;
//! let sales = db.sales_with(config.sale);
//!
//! let record = sales
//!     .create_sale(&user_id, CreateSaleRequest::cash(vec![CartItem::new(&product_id, 3)]))
//!     .await?;
//! sales.set_sale_status(&record.transaction.id, "refunded").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod pool;
pub mod repository;
pub mod service;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, KasirConfig};
pub use error::{DbError, DbResult, SaleError, SaleResult};
pub use pool::{Database, DbConfig};
pub use service::{SaleService, SaleServiceConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::transaction::TransactionRepository;
pub use repository::user::UserRepository;
