//! # Sale Service
//!
//! Point-of-sale transactions and their statistics.
//!
//! ```text
//!  record_sale
//!    1. merge lines, check stock for every product   (nothing written yet)
//!    2. price: subtotal - discount + VAT, cash change
//!    3. insert sale + items                          (one transaction)
//!    4. per line: stock movement (sale) + STOCK_ADJUST audit
//! ```
//!
//! Once step 3 commits the sale has happened: failures in step 4 and in the
//! CREATE audit entry are logged and the receipt is still returned, so the
//! cashier never rings the same basket up twice.
//!
//! The statistics fold over stored sales in memory.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shopdesk_core::numbering::receipt_number;
use shopdesk_core::order::{consolidate_lines, LineRequest};
use shopdesk_core::pricing::{cash_change, line_total, subtotal_of};
use shopdesk_core::validation::validate_username;
use shopdesk_core::{
    AuditAction, CoreError, Discount, Identity, Money, PaymentMethod, PricingPolicy, Sale,
    SaleDetail, SaleItem, StockMovement, StockReason, ValidationError,
};
use shopdesk_db::repository::new_id;
use shopdesk_db::Database;
use std::collections::HashMap;
use tracing::{info, warn};

use super::audit::{snapshot, AuditService};
use super::non_empty;
use crate::error::{ApiError, ApiResult};

const LIST_LIMIT: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct RecordSaleRequest {
    #[serde(default)]
    pub customer_username: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub discount: Discount,
    /// Required for cash payments
    #[serde(default)]
    pub cash_received_cents: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub sale_count: usize,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesStats {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub sale_count: usize,
    /// Sum of subtotals before discount
    pub gross: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub items_sold: i64,
    pub average_ticket: Money,
}

/// `[start of date, start of next day)` in UTC.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .map(|next| next.and_time(chrono::NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

#[derive(Debug, Clone)]
pub struct SaleService {
    db: Database,
    pricing: PricingPolicy,
    audit: AuditService,
}

impl SaleService {
    pub fn new(db: Database, pricing: PricingPolicy, audit: AuditService) -> Self {
        SaleService { db, pricing, audit }
    }

    pub async fn record_sale(&self, actor: &Identity, request: RecordSaleRequest) -> ApiResult<SaleDetail> {
        let customer_username = non_empty(request.customer_username);
        if let Some(customer) = &customer_username {
            validate_username(customer)?;
        }

        let lines = consolidate_lines(&request.items)?;

        let sale_id = new_id();
        let products = self.db.products();
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = products
                .get_by_id(&line.product_id)
                .await?
                .filter(|p| p.is_active())
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            product.ensure_stock(line.quantity)?;

            items.push(SaleItem {
                id: new_id(),
                sale_id: sale_id.clone(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.selling_price_cents,
                quantity: line.quantity,
                line_total_cents: line_total(product.selling_price(), line.quantity)?.cents(),
            });
        }

        let subtotal = subtotal_of(items.iter().map(|i| Money::from_cents(i.line_total_cents)))?;
        let totals = self.pricing.sale_totals(subtotal, request.discount)?;

        let (cash_received, change) = match request.payment_method {
            PaymentMethod::Cash => {
                let received = request.cash_received_cents.ok_or_else(|| ValidationError::Required {
                    field: "cash_received_cents".to_string(),
                })?;
                let received = Money::from_cents(received);
                let change = cash_change(totals.total, received)?;
                (Some(received.cents()), Some(change.cents()))
            }
            _ => (None, None),
        };

        let now = Utc::now();
        let sale = Sale {
            id: sale_id,
            receipt_number: receipt_number(now),
            cashier_username: actor.username.clone(),
            customer_username,
            payment_method: request.payment_method,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            cash_received_cents: cash_received,
            change_cents: change,
            created_at: now,
        };
        self.db.sales().insert(&sale, &items).await?;

        for item in &items {
            let movement = match products
                .adjust_stock(
                    &item.product_id,
                    -item.quantity,
                    StockReason::Sale,
                    Some(&sale.id),
                    &actor.username,
                )
                .await
            {
                Ok(movement) => movement,
                Err(e) => {
                    warn!(
                        receipt = %sale.receipt_number,
                        sku = %item.sku_snapshot,
                        quantity = item.quantity,
                        error = %e,
                        "Stock not decremented for sold line"
                    );
                    continue;
                }
            };
            if let Err(e) = self.record_decrement(actor, &sale.id, &movement).await {
                warn!(
                    receipt = %sale.receipt_number,
                    sku = %item.sku_snapshot,
                    error = %e,
                    "Stock decrement not audited"
                );
            }
        }

        let detail = SaleDetail { sale, items };
        if let Err(e) = self.record_created(actor, &detail).await {
            warn!(receipt = %detail.sale.receipt_number, error = %e, "Sale not audited");
        }

        info!(
            receipt = %detail.sale.receipt_number,
            cashier = %actor.username,
            total = %Money::from_cents(detail.sale.total_cents),
            "Sale recorded"
        );
        Ok(detail)
    }

    async fn record_created(&self, actor: &Identity, detail: &SaleDetail) -> ApiResult<()> {
        self.audit
            .record(actor, AuditAction::Create, "Sale", &detail.sale.id, None, Some(snapshot(detail)?))
            .await
    }

    async fn record_decrement(&self, actor: &Identity, sale_id: &str, movement: &StockMovement) -> ApiResult<()> {
        self.audit
            .record(
                actor,
                AuditAction::StockAdjust,
                "Product",
                &movement.product_id,
                Some(snapshot(&serde_json::json!({ "stock_quantity": movement.quantity_before }))?),
                Some(snapshot(&serde_json::json!({
                    "stock_quantity": movement.quantity_after,
                    "sale_id": sale_id,
                }))?),
            )
            .await
    }

    pub async fn get(&self, id: &str) -> ApiResult<SaleDetail> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::from(CoreError::SaleNotFound(id.to_string())))?;
        let items = sales.items(id).await?;
        Ok(SaleDetail { sale, items })
    }

    /// Newest first, optionally only one day.
    pub async fn list(&self, date: Option<NaiveDate>) -> ApiResult<Vec<Sale>> {
        Ok(self.db.sales().list(date.map(day_bounds), LIST_LIMIT).await?)
    }

    pub async fn daily_total(&self, date: NaiveDate) -> ApiResult<DailyTotal> {
        let (from, to) = day_bounds(date);
        let sales = self.db.sales().between(from, to).await?;

        Ok(DailyTotal {
            date,
            sale_count: sales.len(),
            total: sales.iter().map(|s| Money::from_cents(s.total_cents)).sum(),
        })
    }

    /// Best sellers by quantity; ties go to the higher revenue.
    pub async fn top_selling_products(&self, limit: usize) -> ApiResult<Vec<TopProduct>> {
        let items = self.db.sales().all_items().await?;

        let mut by_product: HashMap<String, TopProduct> = HashMap::new();
        for item in items {
            let entry = by_product
                .entry(item.product_id.clone())
                .or_insert_with(|| TopProduct {
                    product_id: item.product_id.clone(),
                    sku: item.sku_snapshot.clone(),
                    name: item.name_snapshot.clone(),
                    quantity: 0,
                    revenue: Money::zero(),
                });
            entry.quantity += item.quantity;
            entry.revenue += Money::from_cents(item.line_total_cents);
        }

        let mut ranked: Vec<TopProduct> = by_product.into_values().collect();
        ranked.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(b.revenue.cmp(&a.revenue))
                .then(a.sku.cmp(&b.sku))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub async fn stats_for_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> ApiResult<SalesStats> {
        if from >= to {
            return Err(ApiError::validation("from must be before to"));
        }

        let sales = self.db.sales().between(from, to).await?;
        let items = self.db.sales().items_between(from, to).await?;

        let cents = |f: fn(&Sale) -> i64| -> Money { sales.iter().map(|s| Money::from_cents(f(s))).sum() };
        let total = cents(|s| s.total_cents);
        let average_ticket = match i64::try_from(sales.len()) {
            Ok(count) if count > 0 => Money::from_cents(total.cents() / count),
            _ => Money::zero(),
        };

        Ok(SalesStats {
            from,
            to,
            sale_count: sales.len(),
            gross: cents(|s| s.subtotal_cents),
            discount: cents(|s| s.discount_cents),
            tax: cents(|s| s.tax_cents),
            total,
            items_sold: items.iter().map(|i| i.quantity).sum(),
            average_ticket,
        })
    }
}
