//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD with archive/restore instead of delete
//! - Filtered listing and substring search, always with an explicit
//!   [`Visibility`]
//! - Stock changes, each recorded as a [`StockMovement`]
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: read, compute, write back (lost update under concurrency)│
//! │     SELECT stock_quantity ... ; UPDATE ... SET stock_quantity = 7   │
//! │                                                                     │
//! │  ✅ CORRECT: delta applied in one statement                         │
//! │     UPDATE products                                                 │
//! │        SET stock_quantity = MAX(stock_quantity + ?delta, 0)         │
//! │      RETURNING stock_quantity                                       │
//! │                                                                     │
//! │  The movement row is written in the same transaction.               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use shopdesk_core::{CatalogStatus, Product, StockMovement, StockReason, Visibility};
use sqlx::SqlitePool;
use tracing::debug;

use super::{like_pattern, new_id, visibility_predicate};
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, description, category_id, supplier_id,
    purchase_price_cents, selling_price_cents, stock_quantity, min_stock_level,
    expiration_date, image_key, status, created_at, updated_at
"#;

/// Optional narrowing for [`ProductRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let found = repo.search("cola", Visibility::ActiveOnly, 20).await?;
/// let movement = repo
///     .adjust_stock(&id, -2, StockReason::Sale, Some(&sale_id), "kim")
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, category_id, supplier_id,
                purchase_price_cents, selling_price_cents, stock_quantity, min_stock_level,
                expiration_date, image_key, status, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(product.purchase_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.stock_quantity)
        .bind(product.min_stock_level)
        .bind(product.expiration_date)
        .bind(&product.image_key)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(&product.sku))?;

        Ok(())
    }

    /// Gets a product by its ID, archived or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets a product by its SKU, archived or not.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists products, optionally narrowed to a category and/or supplier.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        visibility: Visibility,
    ) -> DbResult<Vec<Product>> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE {}
              AND (?1 IS NULL OR category_id = ?1)
              AND (?2 IS NULL OR supplier_id = ?2)
            ORDER BY name
            "#,
            visibility_predicate(visibility)
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&filter.category_id)
            .bind(&filter.supplier_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Case-insensitive substring search across SKU, name and description.
    ///
    /// Exact SKU matches sort first.
    pub async fn search(
        &self,
        query: &str,
        visibility: Visibility,
        limit: u32,
    ) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE {}
              AND (
                LOWER(sku) LIKE ?1 ESCAPE '\'
                OR LOWER(name) LIKE ?1 ESCAPE '\'
                OR LOWER(COALESCE(description, '')) LIKE ?1 ESCAPE '\'
              )
            ORDER BY (LOWER(sku) = ?2) DESC, name
            LIMIT ?3
            "#,
            visibility_predicate(visibility)
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(like_pattern(query))
            .bind(query.to_lowercase())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Active products at or below their minimum stock level.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE status = 'active' AND stock_quantity <= min_stock_level
            ORDER BY stock_quantity, name
            "#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Active products expiring on or before `date`.
    pub async fn expiring_before(&self, date: NaiveDate) -> DbResult<Vec<Product>> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE status = 'active'
              AND expiration_date IS NOT NULL
              AND expiration_date <= ?1
            ORDER BY expiration_date, name
            "#
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Updates the editable fields of a product.
    ///
    /// Stock and status are not touched here; they have their own
    /// operations so every stock change leaves a movement.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2,
                name = ?3,
                description = ?4,
                category_id = ?5,
                supplier_id = ?6,
                purchase_price_cents = ?7,
                selling_price_cents = ?8,
                min_stock_level = ?9,
                expiration_date = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(&product.supplier_id)
        .bind(product.purchase_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.min_stock_level)
        .bind(product.expiration_date)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(&product.sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Archives or restores a product.
    pub async fn set_status(&self, id: &str, status: CatalogStatus) -> DbResult<()> {
        debug!(id = %id, ?status, "Changing product status");

        let result =
            sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(status)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    pub async fn set_image_key(&self, id: &str, image_key: Option<&str>) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE products SET image_key = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(image_key)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Applies a stock delta, clamping the result at zero, and records the
    /// movement in the same transaction.
    ///
    /// ## Arguments
    /// * `delta` - Change in stock (negative for sales, positive for restocking)
    /// * `reference_id` - Sale or order that caused the change
    pub async fn adjust_stock(
        &self,
        id: &str,
        delta: i64,
        reason: StockReason,
        reference_id: Option<&str>,
        actor: &str,
    ) -> DbResult<StockMovement> {
        debug!(id = %id, delta = %delta, ?reason, "Adjusting stock");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock, so the quantity read
        // here cannot change before the second statement runs.
        let quantity_before: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products SET updated_at = ?2
            WHERE id = ?1
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let quantity_before = quantity_before.ok_or_else(|| DbError::not_found("Product", id))?;
        let quantity_after = quantity_before.saturating_add(delta).max(0);

        sqlx::query("UPDATE products SET stock_quantity = ?2 WHERE id = ?1")
            .bind(id)
            .bind(quantity_after)
            .execute(&mut *tx)
            .await?;

        let movement = StockMovement {
            id: new_id(),
            product_id: id.to_string(),
            delta,
            quantity_before,
            quantity_after,
            reason,
            reference_id: reference_id.map(str::to_string),
            actor: actor.to_string(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, delta, quantity_before, quantity_after,
                reason, reference_id, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.delta)
        .bind(movement.quantity_before)
        .bind(movement.quantity_after)
        .bind(movement.reason)
        .bind(&movement.reference_id)
        .bind(&movement.actor)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(movement)
    }

    /// Stock history for a product, newest first.
    pub async fn movements(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, delta, quantity_before, quantity_after,
                   reason, reference_id, actor, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    pub async fn count(&self, visibility: Visibility) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM products WHERE {}",
            visibility_predicate(visibility)
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Stock on hand valued at purchase price, in cents (active products).
    pub async fn inventory_value_cents(&self) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(stock_quantity * purchase_price_cents), 0)
            FROM products
            WHERE status = 'active'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }
}
