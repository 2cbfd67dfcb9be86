//! # Repository Module
//!
//! Database repository implementations for Kasir.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP handler / seed binary                                            │
//! │       │                                                                 │
//! │       │  db.products().list(&filter)                                   │
//! │       ▼                                                                 │
//! │  ProductRepository  CategoryRepository  CustomerRepository  ...        │
//! │       │   (pool: each call is its own statement)                       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  SaleService                                                           │
//! │       │   (UnitOfWork: one connection, BEGIN IMMEDIATE)                │
//! │       ▼                                                                 │
//! │  product::find_active_by_ids, transaction::insert_*, ledger::*         │
//! │       (free functions on &mut SqliteConnection)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - catalog CRUD, filters, bulk edits, stats
//! - [`category::CategoryRepository`] - product groupings
//! - [`customer::CustomerRepository`] - customer records
//! - [`user::UserRepository`] - operators
//! - [`transaction::TransactionRepository`] - sales history
//! - [`report::ReportRepository`] - dashboard aggregations

pub mod category;
pub mod customer;
pub mod product;
pub mod report;
pub mod transaction;
pub mod user;
