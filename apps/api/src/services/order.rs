//! # Order Service
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create ──► PENDING ─► CONFIRMED ─► PREPARING ─► READY_FOR_PICKUP       │
//! │                │           │            │               │               │
//! │                │           └────────────┴───────────────┴──► COMPLETED  │
//! │                │                                             (publish)  │
//! │                └──────── any non-terminal ──────────────────► CANCELLED │
//! │                                                                         │
//! │  create:     lines merged, stock checked, totals priced, nothing       │
//! │              written on failure, stock NOT decremented                 │
//! │  COMPLETED:  OrderCompleted → CompletionPipeline (stock, invoice,      │
//! │              loyalty)                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status writes are guarded by the status that was read, so an order can
//! only be completed once even under concurrent requests. Once that write
//! lands, nothing after it may keep [`OrderCompleted`] from being published:
//! the event is built from data read before the write, and a failed audit
//! entry is logged rather than returned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shopdesk_core::numbering::order_number;
use shopdesk_core::order::{consolidate_lines, LineRequest};
use shopdesk_core::pricing::{line_total, subtotal_of};
use shopdesk_core::validation::{validate_email, validate_username};
use shopdesk_core::{
    AuditAction, CoreError, Identity, Money, Order, OrderDetail, OrderItem, OrderStatus,
    PaymentMethod, PaymentStatus, PricingPolicy, DEFAULT_CANCEL_REASON,
};
use shopdesk_db::repository::new_id;
use shopdesk_db::{Database, OrderFilter, StatusChange};
use tracing::{debug, info, warn};

use super::audit::{snapshot, AuditService};
use super::events::{CompletedLine, CompletionPipeline, OrderCompleted};
use super::invoice::{invoice_filename, render_invoice};
use super::non_empty;
use crate::error::{ApiError, ApiResult};

const LIST_LIMIT: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    /// Defaults to the caller. Only staff may order for someone else.
    #[serde(default)]
    pub customer_username: Option<String>,
    /// Defaults to the customer's account email.
    #[serde(default)]
    pub customer_email: Option<String>,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    /// Only used when cancelling
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct StatusSnapshot<'a> {
    status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Database,
    pricing: PricingPolicy,
    audit: AuditService,
    pipeline: CompletionPipeline,
}

impl OrderService {
    pub fn new(db: Database, pricing: PricingPolicy, audit: AuditService, pipeline: CompletionPipeline) -> Self {
        OrderService {
            db,
            pricing,
            audit,
            pipeline,
        }
    }

    pub async fn create(&self, actor: &Identity, request: CreateOrderRequest) -> ApiResult<OrderDetail> {
        let customer = non_empty(request.customer_username).unwrap_or_else(|| actor.username.clone());
        if !actor.is_staff() && customer != actor.username {
            return Err(ApiError::forbidden("Customers can only order for themselves"));
        }
        validate_username(&customer)?;

        let customer_email = match non_empty(request.customer_email) {
            Some(email) => {
                validate_email(&email)?;
                Some(email)
            }
            None => self
                .db
                .users()
                .get_by_username(&customer)
                .await?
                .and_then(|user| user.email),
        };

        let lines = consolidate_lines(&request.items)?;

        let order_id = new_id();
        let products = self.db.products();
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = products
                .get_by_id(&line.product_id)
                .await?
                .filter(|p| p.is_active())
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            product.ensure_stock(line.quantity)?;

            let line_total = line_total(product.selling_price(), line.quantity)?;
            items.push(OrderItem {
                id: new_id(),
                order_id: order_id.clone(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.selling_price_cents,
                quantity: line.quantity,
                line_total_cents: line_total.cents(),
            });
        }

        let subtotal = subtotal_of(items.iter().map(|i| Money::from_cents(i.line_total_cents)))?;
        let totals = self.pricing.order_totals(subtotal)?;

        let now = Utc::now();
        let order = Order {
            id: order_id,
            order_number: order_number(now),
            customer_username: customer,
            customer_email,
            status: OrderStatus::Pending,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Pending,
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            shipping_cents: totals.shipping.cents(),
            total_cents: totals.total.cents(),
            cancel_reason: None,
            paypal_order_id: None,
            notes: non_empty(request.notes),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.db.orders().insert(&order, &items).await?;

        let detail = OrderDetail { order, items };
        self.audit
            .record(actor, AuditAction::Create, "Order", &detail.order.id, None, Some(snapshot(&detail)?))
            .await?;

        info!(
            order_number = %detail.order.order_number,
            customer = %detail.order.customer_username,
            lines = detail.items.len(),
            total = %detail.order.total(),
            "Order created"
        );
        Ok(detail)
    }

    async fn load(&self, id: &str) -> ApiResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(id.to_string()).into())
    }

    async fn load_for(&self, actor: &Identity, id: &str) -> ApiResult<Order> {
        let order = self.load(id).await?;
        if !actor.can_access_customer(&order.customer_username) {
            return Err(ApiError::forbidden("Not your order"));
        }
        Ok(order)
    }

    async fn detail(&self, order: Order) -> ApiResult<OrderDetail> {
        let items = self.db.orders().items(&order.id).await?;
        Ok(OrderDetail { order, items })
    }

    pub async fn get(&self, actor: &Identity, id: &str) -> ApiResult<OrderDetail> {
        let order = self.load_for(actor, id).await?;
        self.detail(order).await
    }

    /// Staff see every order; customers only their own.
    pub async fn list(&self, actor: &Identity, status: Option<OrderStatus>) -> ApiResult<Vec<Order>> {
        let filter = OrderFilter {
            customer_username: (!actor.is_staff()).then(|| actor.username.clone()),
            status,
        };
        Ok(self.db.orders().list(&filter, LIST_LIMIT).await?)
    }

    /// Moves an order to `next`, publishing [`OrderCompleted`] when it
    /// reaches COMPLETED.
    pub async fn update_status(
        &self,
        actor: &Identity,
        id: &str,
        next: OrderStatus,
        reason: Option<String>,
    ) -> ApiResult<OrderDetail> {
        let order = self.load(id).await?;
        let from = order.status;
        from.transition_to(next)?;
        let mut detail = self.detail(order).await?;

        let now = Utc::now();
        let change = StatusChange {
            cancel_reason: (next == OrderStatus::Cancelled).then(|| {
                non_empty(reason).unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string())
            }),
            completed_at: (next == OrderStatus::Completed).then_some(now),
        };
        self.db.orders().update_status(id, from, next, &change).await?;

        detail.order.status = next;
        detail.order.updated_at = now;
        if change.cancel_reason.is_some() {
            detail.order.cancel_reason = change.cancel_reason.clone();
        }
        if change.completed_at.is_some() {
            detail.order.completed_at = change.completed_at;
        }
        info!(order_number = %detail.order.order_number, from = %from, to = %next, "Order status changed");

        if next == OrderStatus::Completed {
            let report = self.pipeline.publish(completion_event(&detail, actor)).await;
            debug!(order_number = %detail.order.order_number, ?report, "Completion pipeline finished");
        }

        if let Err(e) = self.record_status_change(actor, id, from, next, change.cancel_reason.as_deref()).await {
            warn!(
                order_number = %detail.order.order_number,
                error = %e,
                "Status change not audited"
            );
        }

        Ok(detail)
    }

    async fn record_status_change(
        &self,
        actor: &Identity,
        id: &str,
        from: OrderStatus,
        next: OrderStatus,
        reason: Option<&str>,
    ) -> ApiResult<()> {
        self.audit
            .record(
                actor,
                AuditAction::StatusChange,
                "Order",
                id,
                Some(snapshot(&StatusSnapshot { status: from, reason: None })?),
                Some(snapshot(&StatusSnapshot { status: next, reason })?),
            )
            .await
    }

    /// Cancels with `reason`, or the default reason when it is blank.
    /// Customers may cancel their own orders.
    pub async fn cancel(&self, actor: &Identity, id: &str, reason: Option<String>) -> ApiResult<OrderDetail> {
        self.load_for(actor, id).await?;
        self.update_status(actor, id, OrderStatus::Cancelled, reason).await
    }

    /// PDF invoice and its file name.
    pub async fn invoice(&self, actor: &Identity, id: &str) -> ApiResult<(String, Vec<u8>)> {
        let detail = self.get(actor, id).await?;
        let pdf = render_invoice(&detail.order, &detail.items)?;
        Ok((invoice_filename(&detail.order), pdf))
    }
}

fn completion_event(detail: &OrderDetail, actor: &Identity) -> OrderCompleted {
    OrderCompleted {
        order_id: detail.order.id.clone(),
        order_number: detail.order.order_number.clone(),
        customer_username: detail.order.customer_username.clone(),
        customer_email: detail.order.customer_email.clone(),
        amount: detail.order.total(),
        lines: detail
            .items
            .iter()
            .map(|item| CompletedLine {
                product_id: item.product_id.clone(),
                sku: item.sku_snapshot.clone(),
                quantity: item.quantity,
            })
            .collect(),
        completed_by: actor.username.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::email::LogMailer;
    use crate::services::events::{LoyaltyWorker, StockPolicy};
    use shopdesk_core::{CatalogStatus, Product, Role};
    use shopdesk_db::DbConfig;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Fixture {
        db: Database,
        service: OrderService,
        loyalty_rx: mpsc::Receiver<OrderCompleted>,
    }

    async fn fixture(pricing: PricingPolicy) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (tx, loyalty_rx) = LoyaltyWorker::channel();
        let pipeline = CompletionPipeline::new(db.clone(), StockPolicy::Lenient, Arc::new(LogMailer), tx);
        let service = OrderService::new(db.clone(), pricing, AuditService::new(db.clone()), pipeline);
        Fixture { db, service, loyalty_rx }
    }

    async fn product(db: &Database, sku: &str, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            category_id: None,
            supplier_id: None,
            purchase_price_cents: 500,
            selling_price_cents: 1000,
            stock_quantity: stock,
            min_stock_level: 0,
            expiration_date: None,
            image_key: None,
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    fn customer() -> Identity {
        Identity::new("ana", vec![Role::Customer])
    }

    fn staff() -> Identity {
        Identity::new("kim", vec![Role::Employee])
    }

    fn request(lines: Vec<(&str, i64)>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_username: None,
            customer_email: None,
            payment_method: PaymentMethod::Card,
            items: lines
                .into_iter()
                .map(|(product_id, quantity)| LineRequest {
                    product_id: product_id.to_string(),
                    quantity,
                })
                .collect(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_scenario_totals_and_stock_on_completion() {
        let mut f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;

        let detail = f.service.create(&customer(), request(vec![(&p.id, 2)])).await.unwrap();
        assert_eq!(detail.order.subtotal_cents, 2000);
        assert_eq!(detail.order.tax_cents, 400);
        assert_eq!(detail.order.shipping_cents, 500);
        assert_eq!(detail.order.total_cents, 2900);
        assert_eq!(f.db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_quantity, 3);

        let id = detail.order.id.clone();
        f.service
            .update_status(&staff(), &id, OrderStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(f.db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_quantity, 1);

        let event = f.loyalty_rx.recv().await.unwrap();
        assert_eq!(event.amount, Money::from_cents(2900));
        assert_eq!(event.completed_by, "kim");
    }

    #[tokio::test]
    async fn test_zero_shipping_fee_policy() {
        let f = fixture(PricingPolicy {
            shipping_fee: Money::zero(),
            ..PricingPolicy::default()
        })
        .await;
        let p = product(&f.db, "SKU-1", 3).await;

        let detail = f.service.create(&customer(), request(vec![(&p.id, 2)])).await.unwrap();
        assert_eq!(detail.order.total_cents, 2400);
    }

    #[tokio::test]
    async fn test_duplicate_lines_checked_together_and_nothing_written() {
        let f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;

        let err = f
            .service
            .create(&customer(), request(vec![(&p.id, 2), (&p.id, 2)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("SKU-1"));
        assert!(f.service.list(&staff(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archived_product_is_not_orderable() {
        let f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;
        f.db.products().set_status(&p.id, CatalogStatus::Archived).await.unwrap();

        let err = f.service.create(&customer(), request(vec![(&p.id, 1)])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_customers_order_only_for_themselves() {
        let f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;

        let mut req = request(vec![(&p.id, 1)]);
        req.customer_username = Some("bob".to_string());
        let err = f.service.create(&customer(), req.clone()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let detail = f.service.create(&staff(), req).await.unwrap();
        assert_eq!(detail.order.customer_username, "bob");
        assert!(f.service.get(&customer(), &detail.order.id).await.is_err());
        assert!(f.service.list(&customer(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_completion_is_rejected() {
        let mut f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;
        let id = f.service.create(&customer(), request(vec![(&p.id, 1)])).await.unwrap().order.id;

        f.service.update_status(&staff(), &id, OrderStatus::Completed, None).await.unwrap();
        let err = f
            .service
            .update_status(&staff(), &id, OrderStatus::Completed, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);

        assert!(f.loyalty_rx.recv().await.is_some());
        assert!(f.loyalty_rx.try_recv().is_err());
        assert_eq!(f.db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_backward_move_rejected_and_cancel_default_reason() {
        let f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;
        let id = f.service.create(&customer(), request(vec![(&p.id, 1)])).await.unwrap().order.id;

        f.service.update_status(&staff(), &id, OrderStatus::Preparing, None).await.unwrap();
        let err = f
            .service
            .update_status(&staff(), &id, OrderStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);

        let cancelled = f.service.cancel(&customer(), &id, Some("  ".to_string())).await.unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.order.cancel_reason.as_deref(), Some(DEFAULT_CANCEL_REASON));
    }

    #[tokio::test]
    async fn test_missing_order() {
        let f = fixture(PricingPolicy::default()).await;
        let err = f
            .service
            .update_status(&staff(), "nope", OrderStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_completion_published_even_when_audit_write_fails() {
        let mut f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;
        let id = f.service.create(&customer(), request(vec![(&p.id, 2)])).await.unwrap().order.id;

        sqlx::query("DROP TABLE audit_log").execute(f.db.pool()).await.unwrap();

        let detail = f
            .service
            .update_status(&staff(), &id, OrderStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(detail.order.status, OrderStatus::Completed);
        assert!(detail.order.completed_at.is_some());
        assert_eq!(detail.items.len(), 1);

        let event = f.loyalty_rx.recv().await.unwrap();
        assert_eq!(event.order_id, id);
        assert_eq!(event.amount, Money::from_cents(2900));
        assert_eq!(f.db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_quantity, 1);
    }

    #[tokio::test]
    async fn test_line_total_overflow_is_a_validation_error() {
        let f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;
        // written behind validation's back, as an imported legacy row would be
        sqlx::query("UPDATE products SET selling_price_cents = ?1, purchase_price_cents = 1 WHERE id = ?2")
            .bind(i64::MAX / 2 + 1)
            .bind(&p.id)
            .execute(f.db.pool())
            .await
            .unwrap();

        let err = f.service.create(&customer(), request(vec![(&p.id, 2)])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(f.service.list(&staff(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_renders_for_owner() {
        let f = fixture(PricingPolicy::default()).await;
        let p = product(&f.db, "SKU-1", 3).await;
        let detail = f.service.create(&customer(), request(vec![(&p.id, 1)])).await.unwrap();

        let (filename, pdf) = f.service.invoice(&customer(), &detail.order.id).await.unwrap();
        assert!(filename.starts_with("invoice-ORD-"));
        assert!(pdf.starts_with(b"%PDF"));
    }
}
