//! # Sale Repository
//!
//! Point-of-sale transactions. Sales are immutable once written; there is
//! no update or delete.

use chrono::{DateTime, Utc};
use shopdesk_core::{Sale, SaleItem};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

const SALE_COLUMNS: &str = r#"
    id, receipt_number, cashier_username, customer_username, payment_method,
    subtotal_cents, discount_cents, tax_cents, total_cents,
    cash_received_cents, change_cents, created_at
"#;

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale with its items in one transaction.
    pub async fn insert(&self, sale: &Sale, items: &[SaleItem]) -> DbResult<()> {
        debug!(
            receipt = %sale.receipt_number,
            items = items.len(),
            total = sale.total_cents,
            "Inserting sale"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, cashier_username, customer_username, payment_method,
                subtotal_cents, discount_cents, tax_cents, total_cents,
                cash_received_cents, change_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(&sale.cashier_username)
        .bind(&sale.customer_username)
        .bind(sale.payment_method)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.cash_received_cents)
        .bind(sale.change_cents)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_value(&sale.receipt_number))?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, sku_snapshot, name_snapshot,
                    unit_price_cents, quantity, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, sku_snapshot, name_snapshot,
                   unit_price_cents, quantity, line_total_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY sku_snapshot
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Sales created in `[from, to)`, newest first. `None` means all time.
    pub async fn list(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        limit: u32,
    ) -> DbResult<Vec<Sale>> {
        let (from, to) = range.unzip();
        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
            ORDER BY created_at DESC
            LIMIT ?3
            "#
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    /// Every sale created in `[from, to)`, oldest first, without a limit.
    pub async fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Sale>> {
        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at
            "#
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    /// Every sale item ever recorded.
    pub async fn all_items(&self) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, sku_snapshot, name_snapshot,
                   unit_price_cents, quantity, line_total_cents
            FROM sale_items
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Items belonging to sales created in `[from, to)`.
    pub async fn items_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT i.id, i.sale_id, i.product_id, i.sku_snapshot, i.name_snapshot,
                   i.unit_price_cents, i.quantity, i.line_total_cents
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            WHERE s.created_at >= ?1 AND s.created_at < ?2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{new_id, test_support};
    use chrono::Duration;
    use shopdesk_core::PaymentMethod;

    fn sale(at: DateTime<Utc>) -> (Sale, Vec<SaleItem>) {
        let id = new_id();
        let sale = Sale {
            id: id.clone(),
            receipt_number: format!("RCP-{}", new_id()),
            cashier_username: "kim".to_string(),
            customer_username: None,
            payment_method: PaymentMethod::Cash,
            subtotal_cents: 1000,
            discount_cents: 0,
            tax_cents: 200,
            total_cents: 1200,
            cash_received_cents: Some(2000),
            change_cents: Some(800),
            created_at: at,
        };
        let items = vec![SaleItem {
            id: new_id(),
            sale_id: id,
            product_id: "p-1".to_string(),
            sku_snapshot: "SKU-1".to_string(),
            name_snapshot: "Widget".to_string(),
            unit_price_cents: 500,
            quantity: 2,
            line_total_cents: 1000,
        }];
        (sale, items)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_support::db().await;
        let repo = db.sales();
        let (s, items) = sale(Utc::now());
        repo.insert(&s, &items).await.unwrap();

        let loaded = repo.get_by_id(&s.id).await.unwrap().unwrap();
        assert_eq!(loaded.change_cents, Some(800));
        assert_eq!(repo.items(&s.id).await.unwrap()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_range_queries() {
        let db = test_support::db().await;
        let repo = db.sales();
        let now = Utc::now();

        let (old, old_items) = sale(now - Duration::days(3));
        let (recent, recent_items) = sale(now);
        repo.insert(&old, &old_items).await.unwrap();
        repo.insert(&recent, &recent_items).await.unwrap();

        let from = now - Duration::hours(1);
        let to = now + Duration::hours(1);
        assert_eq!(repo.between(from, to).await.unwrap().len(), 1);
        assert_eq!(repo.items_between(from, to).await.unwrap().len(), 1);
        assert_eq!(repo.list(None, 10).await.unwrap().len(), 2);
        assert_eq!(repo.list(Some((from, to)), 10).await.unwrap().len(), 1);
        assert_eq!(repo.all_items().await.unwrap().len(), 2);
    }
}
