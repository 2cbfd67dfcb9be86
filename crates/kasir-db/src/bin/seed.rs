//! # Seed Data Generator
//!
//! Populates the database with a small shop for development: categories,
//! products, customers and one admin operator.
//!
//! ## Usage
//! ```bash
//! # Uses KASIR_DATABASE_PATH (default ./kasir.db)
//! cargo run -p kasir-db --bin seed
//!
//! # Specify database path
//! cargo run -p kasir-db --bin seed -- --db ./data/kasir.db
//!
//! # More log output
//! RUST_LOG=kasir_db=debug cargo run -p kasir-db --bin seed
//! ```

use std::env;

use kasir_core::input::{NewCategory, NewCustomer, NewProduct, NewUser};
use kasir_core::{Money, UserRole};
use kasir_db::{Database, KasirConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (name, color, products as (sku, name, price, cost, stock))
const CATALOG: &[(&str, &str, &[(&str, &str, i64, i64, i64)])] = &[
    (
        "Minuman",
        "#3B82F6",
        &[
            ("MNM-001", "Kopi Susu", 18_000, 9_000, 120),
            ("MNM-002", "Kopi Hitam", 15_000, 6_500, 80),
            ("MNM-003", "Teh Manis", 8_000, 2_500, 150),
            ("MNM-004", "Air Mineral 600ml", 5_000, 2_800, 240),
            ("MNM-005", "Jus Jeruk", 14_000, 7_000, 6),
        ],
    ),
    (
        "Makanan",
        "#F59E0B",
        &[
            ("MKN-001", "Nasi Goreng", 25_000, 12_000, 40),
            ("MKN-002", "Mie Goreng", 22_000, 10_000, 35),
            ("MKN-003", "Roti Bakar", 15_000, 6_000, 8),
            ("MKN-004", "Pisang Goreng", 10_000, 4_000, 0),
        ],
    ),
    (
        "Snack",
        "#10B981",
        &[
            ("SNK-001", "Keripik Singkong", 12_000, 6_000, 60),
            ("SNK-002", "Kacang Atom", 9_000, 4_500, 45),
            ("SNK-003", "Cokelat Batang", 11_000, 7_000, 3),
        ],
    ),
];

const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Budi Santoso", "budi@example.com", "0812-0000-1111"),
    ("Sari Wulandari", "sari@example.com", "0813-0000-2222"),
    ("Andi Pratama", "andi@example.com", "0814-0000-3333"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = KasirConfig::from_env()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    config.database.database_path = path.into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kasir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $KASIR_DATABASE_PATH or ./kasir.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(path = %config.database.database_path.display(), "Seeding database");
    let db = Database::new(config.database).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let admin = db
        .users()
        .create(NewUser {
            full_name: "Administrator".to_string(),
            email: "admin@kasir.local".to_string(),
            role: UserRole::Admin,
        })
        .await?;
    info!(id = %admin.id, email = %admin.email, "Created operator");

    let mut products = 0;
    for (category_name, color, items) in CATALOG {
        let category = db
            .categories()
            .create(NewCategory {
                name: category_name.to_string(),
                description: None,
                color: Some(color.to_string()),
            })
            .await?;

        for (sku, name, price, cost, stock) in items.iter() {
            db.products()
                .create(NewProduct {
                    sku: sku.to_string(),
                    name: name.to_string(),
                    category_id: Some(category.id.clone()),
                    barcode: None,
                    description: None,
                    price: Money::from_cents(*price),
                    cost: Some(Money::from_cents(*cost)),
                    stock: *stock,
                    min_stock: 10,
                })
                .await?;
            products += 1;
        }
    }
    info!(categories = CATALOG.len(), products, "Created catalog");

    for (name, email, phone) in CUSTOMERS {
        db.customers()
            .create(NewCustomer {
                name: name.to_string(),
                email: Some(email.to_string()),
                phone: Some(phone.to_string()),
                address: None,
            })
            .await?;
    }
    info!(customers = CUSTOMERS.len(), "Created customers");

    let stats = db.products().stats().await?;
    info!(
        low_stock = stats.low_stock,
        out_of_stock = stats.out_of_stock,
        total_stock = stats.total_stock,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
