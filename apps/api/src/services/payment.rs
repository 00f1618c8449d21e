//! Online payment of orders through PayPal.
//!
//! ```text
//! POST /api/orders/{id}/paypal          create PayPal order, store its id,
//!                                       payment_status = pending
//!        (buyer approves on PayPal)
//! POST /api/orders/{id}/paypal/capture  capture; COMPLETED → paid + PAYMENT audit
//! ```
//!
//! Without a `[paypal]` section both calls answer SERVICE_UNAVAILABLE.

use serde::Serialize;
use shopdesk_core::{AuditAction, Identity, Order, OrderStatus, PaymentStatus};
use shopdesk_db::Database;
use tracing::{info, warn};

use super::audit::{snapshot, AuditService};
use super::order::OrderService;
use super::paypal::{CreatedPayment, PaypalClient, PaypalError};
use crate::error::{ApiError, ApiResult};

impl From<PaypalError> for ApiError {
    fn from(err: PaypalError) -> Self {
        warn!(error = %err, "PayPal call failed");
        ApiError::unavailable(format!("Payment provider error: {err}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub order_id: String,
    pub paypal_order_id: String,
    pub provider_status: String,
    pub payment_status: PaymentStatus,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Database,
    orders: OrderService,
    paypal: Option<PaypalClient>,
    audit: AuditService,
}

impl PaymentService {
    pub fn new(db: Database, orders: OrderService, paypal: Option<PaypalClient>, audit: AuditService) -> Self {
        PaymentService {
            db,
            orders,
            paypal,
            audit,
        }
    }

    fn gateway(&self) -> ApiResult<&PaypalClient> {
        self.paypal
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("PayPal is not configured"))
    }

    pub async fn create_paypal(&self, actor: &Identity, order_id: &str) -> ApiResult<CreatedPayment> {
        let gateway = self.gateway()?;
        let order = self.orders.get(actor, order_id).await?.order;
        ensure_payable(&order)?;

        let created = gateway.create_order(&order.id, order.total()).await?;
        self.db
            .orders()
            .set_payment(&order.id, Some(&created.paypal_order_id), PaymentStatus::Pending)
            .await?;

        info!(
            order_number = %order.order_number,
            paypal_order_id = %created.paypal_order_id,
            "PayPal payment started"
        );
        Ok(created)
    }

    pub async fn capture_paypal(&self, actor: &Identity, order_id: &str) -> ApiResult<PaymentOutcome> {
        let gateway = self.gateway()?;
        let order = self.orders.get(actor, order_id).await?.order;
        ensure_payable(&order)?;

        let paypal_order_id = order
            .paypal_order_id
            .clone()
            .ok_or_else(|| ApiError::invalid_operation("No PayPal payment was started for this order"))?;

        let capture = gateway.capture_order(&paypal_order_id).await?;
        if !capture.is_completed() {
            warn!(order_number = %order.order_number, status = %capture.status, "PayPal capture not completed");
            return Ok(PaymentOutcome {
                order_id: order.id,
                paypal_order_id,
                provider_status: capture.status,
                payment_status: order.payment_status,
            });
        }

        self.db
            .orders()
            .set_payment(&order.id, None, PaymentStatus::Paid)
            .await?;
        self.audit
            .record(
                actor,
                AuditAction::Payment,
                "Order",
                &order.id,
                Some(snapshot(&serde_json::json!({ "payment_status": order.payment_status }))?),
                Some(snapshot(&serde_json::json!({
                    "payment_status": PaymentStatus::Paid,
                    "paypal_order_id": paypal_order_id,
                    "amount": order.total(),
                }))?),
            )
            .await?;

        info!(order_number = %order.order_number, amount = %order.total(), "Order paid");
        Ok(PaymentOutcome {
            order_id: order.id,
            paypal_order_id,
            provider_status: capture.status,
            payment_status: PaymentStatus::Paid,
        })
    }
}

fn ensure_payable(order: &Order) -> ApiResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(ApiError::invalid_operation("A cancelled order cannot be paid"));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(ApiError::invalid_operation("Order is already paid"));
    }
    Ok(())
}
