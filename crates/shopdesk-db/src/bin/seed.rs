//! # Seed Data Generator
//!
//! Populates a development database with categories, suppliers and products.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p shopdesk-db --bin seed
//!
//! # Generate custom amount into a specific file
//! cargo run -p shopdesk-db --bin seed -- --count 2000 --db ./data/shopdesk.db
//! ```
//!
//! ## Generated Data
//! - One category per code below (Beverages, Snacks, Dairy, Frozen, Grocery)
//! - Three suppliers, assigned round-robin
//! - Products with SKU `{CODE}-{NAME}-{NNN}`, purchase price at 60-80% of the
//!   selling price, stock 0-100 and a minimum stock level of 5
//! - Dairy products get an expiration date 3-40 days out

use anyhow::Context;
use chrono::{Duration, Utc};
use shopdesk_core::{CatalogStatus, Category, Product, Supplier, Visibility};
use shopdesk_db::repository::new_id;
use shopdesk_db::{Database, DbConfig};
use std::env;
use tracing::{info, warn};

/// (code, category name, product names)
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "BEV",
        "Beverages",
        &[
            "Coca-Cola",
            "Sparkling Water",
            "Orange Juice",
            "Apple Juice",
            "Lemonade",
            "Iced Tea",
            "Cold Brew Coffee",
            "Energy Drink",
        ],
    ),
    (
        "SNK",
        "Snacks",
        &[
            "Sea Salt Crisps",
            "Tortilla Chips",
            "Pretzels",
            "Dark Chocolate Bar",
            "Gummy Bears",
            "Oat Cookies",
            "Trail Mix",
            "Popcorn",
        ],
    ),
    (
        "DRY",
        "Dairy",
        &[
            "Whole Milk",
            "Oat Milk",
            "Cheddar Cheese",
            "Mozzarella",
            "Butter",
            "Greek Yogurt",
            "Cream Cheese",
            "Eggs Dozen",
        ],
    ),
    (
        "FRZ",
        "Frozen",
        &[
            "Vanilla Ice Cream",
            "Frozen Pizza",
            "Frozen Berries",
            "Fish Fingers",
            "Frozen Peas",
            "Sorbet",
            "Waffles",
            "Veggie Burgers",
        ],
    ),
    (
        "GRO",
        "Grocery",
        &[
            "Sourdough Bread",
            "Spaghetti",
            "Basmati Rice",
            "Canned Tomatoes",
            "Peanut Butter",
            "Honey",
            "Rolled Oats",
            "Olive Oil",
        ],
    ),
];

const SUPPLIERS: &[(&str, &str)] = &[
    ("Northwind Wholesale", "orders@northwind.test"),
    ("Harbor Foods", "supply@harborfoods.test"),
    ("Green Valley Farms", "hello@greenvalley.test"),
];

/// Size variants and the price they add, in cents
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("Family", 450),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./shopdesk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1]
                        .parse()
                        .with_context(|| format!("invalid --count value: {}", args[i + 1]))?;
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
                println!("Shopdesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./shopdesk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(database = %db_path, products = count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("failed to open database")?;

    let existing = db.products().count(Visibility::IncludeArchived).await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products; skipping seed. Delete the file to regenerate."
        );
        return Ok(());
    }

    let now = Utc::now();

    // =========================================================================
    // Suppliers
    // =========================================================================
    let mut supplier_ids = Vec::with_capacity(SUPPLIERS.len());
    for (name, email) in SUPPLIERS {
        let supplier = Supplier {
            id: new_id(),
            name: name.to_string(),
            contact_name: None,
            email: Some(email.to_string()),
            phone: None,
            address: None,
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        };
        db.suppliers().insert(&supplier).await?;
        supplier_ids.push(supplier.id);
    }

    // =========================================================================
    // Categories and products
    // =========================================================================
    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (code, category_name, names)) in CATEGORIES.iter().enumerate() {
        let category = Category {
            id: new_id(),
            name: category_name.to_string(),
            description: Some(format!("{category_name} ({code})")),
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        };
        db.categories().insert(&category).await?;

        for (product_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + product_idx * 20 + size_idx;
                let mut product = generate_product(code, name, size, *price_addon, seed);
                product.category_id = Some(category.id.clone());
                product.supplier_id = Some(supplier_ids[seed % supplier_ids.len()].clone());

                if let Err(e) = db.products().insert(&product).await {
                    warn!(sku = %product.sku, error = %e, "Failed to insert product");
                    continue;
                }

                generated += 1;
                if generated % 100 == 0 {
                    info!(generated, "Progress");
                }
            }
        }
    }

    let elapsed = start.elapsed();
    info!(
        generated,
        elapsed_ms = elapsed.as_millis() as u64,
        "Products generated"
    );

    let found = db.products().search("milk", Visibility::ActiveOnly, 10).await?;
    info!(results = found.len(), "Search 'milk'");

    let low = db.products().low_stock().await?;
    info!(low_stock = low.len(), "Seed complete");

    Ok(())
}

/// Generates a single product with plausible data.
fn generate_product(code: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{code}-{short}-{seed:03}");

    // Selling price 1.99 - 9.98 plus size addon
    let selling_price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;

    // Purchase price at 60-79% of selling
    let purchase_price_cents = (selling_price_cents * (60 + (seed % 20) as i64) / 100).max(1);

    let expiration_date = (code == "DRY")
        .then(|| (now + Duration::days(3 + (seed % 38) as i64)).date_naive());

    Product {
        id: new_id(),
        sku,
        name: format!("{name} {size}"),
        description: None,
        category_id: None,
        supplier_id: None,
        purchase_price_cents,
        selling_price_cents,
        stock_quantity: (seed % 101) as i64,
        min_stock_level: 5,
        expiration_date,
        image_key: None,
        status: CatalogStatus::Active,
        created_at: now,
        updated_at: now,
    }
}
