//! # Seed Data Generator
//!
//! Populates the database with a demo catalog for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p geoprice-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p geoprice-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p geoprice-db --bin seed -- --db ./data/geoprice.db
//! ```
//!
//! ## Generated Products
//! Each product has:
//! - Unique SKU: `{CATEGORY}-{INDEX}`
//! - Name with a size variant
//! - Base regular price: 4.99 - 89.99
//! - Every fourth product on sale at 80% of regular
//! - Every tenth product left as a draft
//!
//! No per-currency prices are written; the batch job fills those in.

use rust_decimal::Decimal;
use std::env;

use geoprice_db::{Database, DbConfig, NewProduct};

/// Product categories for realistic demo data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "APP",
        &[
            "Linen Shirt",
            "Denim Jacket",
            "Wool Sweater",
            "Rain Coat",
            "Canvas Sneakers",
            "Leather Belt",
            "Silk Scarf",
            "Cotton Hoodie",
        ],
    ),
    (
        "HOM",
        &[
            "Ceramic Mug",
            "Table Lamp",
            "Throw Blanket",
            "Cutting Board",
            "Glass Vase",
            "Wall Clock",
            "Scented Candle",
            "Cast Iron Pan",
        ],
    ),
    (
        "ACC",
        &[
            "Travel Backpack",
            "Card Wallet",
            "Sunglasses",
            "Phone Case",
            "Water Bottle",
            "Umbrella",
            "Watch Strap",
            "Tote Bag",
        ],
    ),
];

/// Size variants and their surcharge in cents
const SIZES: &[(&str, i64)] = &[
    ("S", 0),
    ("M", 200),
    ("L", 400),
    ("XL", 700),
    ("One Size", 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./geoprice_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
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
                println!("GeoPrice Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./geoprice_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("GeoPrice Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, surcharge)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(category_code, name, size, *surcharge, seed);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.name, e);
                    continue;
                }

                generated += 1;
                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    let sellable = db.products().count().await?;
    let ready = db.products().count_ready().await?;
    println!("  Sellable: {}, awaiting conversion: {}", sellable, sellable - ready);

    println!();
    println!("✓ Seed complete! Run `geoprice-batch run` to convert prices.");

    Ok(())
}

/// Generates a single product with deterministic demo data.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    surcharge_cents: i64,
    seed: usize,
) -> NewProduct {
    // 4.99 - 89.99 plus size surcharge
    let base_cents = 499 + ((seed * 37) % 8500) as i64;
    let regular = Decimal::new(base_cents + surcharge_cents, 2);

    let mut product = NewProduct::published(format!("{} ({})", name, size), regular)
        .with_sku(format!("{}-{:04}", category, seed));

    if seed % 4 == 0 {
        let sale = (regular * Decimal::new(80, 2)).round_dp(2);
        product = product.with_sale(sale);
    }
    if seed % 10 == 9 {
        product = product.with_status("draft");
    }

    product
}
