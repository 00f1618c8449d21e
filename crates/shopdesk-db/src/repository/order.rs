//! # Order Repository
//!
//! Orders and their line items. An order and its items are written in one
//! transaction; status changes are guarded by the status the caller read.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ UPDATE orders SET status = 'COMPLETED'                           │
//! │  WHERE id = ?1 AND status = 'READY_FOR_PICKUP'                   │
//! │                                                                  │
//! │ 1 row  → this caller won the transition                          │
//! │ 0 rows → someone else moved the order first → VersionConflict    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard is what keeps two concurrent "complete" requests from both
//! firing the completion pipeline.

use chrono::{DateTime, Utc};
use shopdesk_core::{Order, OrderItem, OrderStatus, PaymentStatus};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer_username, customer_email, status,
    payment_method, payment_status, subtotal_cents, tax_cents, shipping_cents,
    total_cents, cancel_reason, paypal_order_id, notes,
    created_at, updated_at, completed_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, sku_snapshot, name_snapshot,
    unit_price_cents, quantity, line_total_cents
"#;

/// Narrowing for [`OrderRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Only this customer's orders
    pub customer_username: Option<String>,
    pub status: Option<OrderStatus>,
}

/// Fields written together with a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub cancel_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts an order with its items in one transaction.
    pub async fn insert(&self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        debug!(
            order_number = %order.order_number,
            items = items.len(),
            "Inserting order"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_username, customer_email, status,
                payment_method, payment_status, subtotal_cents, tax_cents, shipping_cents,
                total_cents, cancel_reason, paypal_order_id, notes,
                created_at, updated_at, completed_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_username)
        .bind(&order.customer_email)
        .bind(order.status)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.total_cents)
        .bind(&order.cancel_reason)
        .bind(&order.paypal_order_id)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_value(&order.order_number))?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, sku_snapshot, name_snapshot,
                    unit_price_cents, quantity, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
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

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY sku_snapshot");
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Lists orders newest first.
    pub async fn list(&self, filter: &OrderFilter, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE (?1 IS NULL OR customer_username = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC
            LIMIT ?3
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(&filter.customer_username)
            .bind(filter.status)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Moves an order from `expected` to `next`.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such order
    /// * `Err(DbError::VersionConflict)` - the order is no longer in `expected`
    pub async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        next: OrderStatus,
        change: &StatusChange,
    ) -> DbResult<()> {
        debug!(id = %id, from = %expected, to = %next, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?3,
                cancel_reason = COALESCE(?4, cancel_reason),
                completed_at = COALESCE(?5, completed_at),
                updated_at = ?6
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(&change.cancel_reason)
        .bind(change.completed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => DbError::conflict("Order", id),
                None => DbError::not_found("Order", id),
            });
        }

        Ok(())
    }

    /// Records payment provider state.
    pub async fn set_payment(
        &self,
        id: &str,
        paypal_order_id: Option<&str>,
        payment_status: PaymentStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                paypal_order_id = COALESCE(?2, paypal_order_id),
                payment_status = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(paypal_order_id)
        .bind(payment_status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Number of orders per status. Statuses with no orders are absent.
    pub async fn count_by_status(&self) -> DbResult<Vec<(OrderStatus, i64)>> {
        let rows: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}
