//! # Dashboard
//!
//! One summary for the back-office landing page.
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────┐
//! │ catalog                  │ active / archived products, categories,  │
//! │                          │ suppliers                                │
//! │ stock                    │ low stock (stock <= minimum), expiring   │
//! │                          │ within 30 days, value at purchase price  │
//! │ today                    │ sales total and count, pending orders    │
//! └──────────────────────────┴──────────────────────────────────────────┘
//! ```

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use shopdesk_core::{Money, OrderStatus, Product, Visibility, EXPIRY_WINDOW_DAYS};
use shopdesk_db::Database;

use super::sale::day_bounds;
use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub active_products: i64,
    pub archived_products: i64,
    pub categories: i64,
    pub suppliers: i64,
    pub low_stock: Vec<Product>,
    pub expiring_soon: Vec<Product>,
    pub inventory_value: Money,
    pub today_sales_total: Money,
    pub today_sales_count: usize,
    pub pending_orders: i64,
}

#[derive(Debug, Clone)]
pub struct DashboardService {
    db: Database,
}

impl DashboardService {
    pub fn new(db: Database) -> Self {
        DashboardService { db }
    }

    pub async fn summary(&self) -> ApiResult<DashboardSummary> {
        self.summary_for(Utc::now().date_naive()).await
    }

    async fn summary_for(&self, today: NaiveDate) -> ApiResult<DashboardSummary> {
        let products = self.db.products();
        let active_products = products.count(Visibility::ActiveOnly).await?;
        let all_products = products.count(Visibility::IncludeArchived).await?;

        let horizon = today
            .checked_add_days(Days::new(EXPIRY_WINDOW_DAYS.unsigned_abs()))
            .unwrap_or(NaiveDate::MAX);

        let (from, to) = day_bounds(today);
        let today_sales = self.db.sales().between(from, to).await?;

        let pending_orders = self
            .db
            .orders()
            .count_by_status()
            .await?
            .into_iter()
            .find(|(status, _)| *status == OrderStatus::Pending)
            .map(|(_, count)| count)
            .unwrap_or(0);

        Ok(DashboardSummary {
            active_products,
            archived_products: all_products - active_products,
            categories: self.db.categories().count(Visibility::ActiveOnly).await?,
            suppliers: self.db.suppliers().count(Visibility::ActiveOnly).await?,
            low_stock: products.low_stock().await?,
            expiring_soon: products.expiring_before(horizon).await?,
            inventory_value: Money::from_cents(products.inventory_value_cents().await?),
            today_sales_total: today_sales.iter().map(|s| Money::from_cents(s.total_cents)).sum(),
            today_sales_count: today_sales.len(),
            pending_orders,
        })
    }
}
