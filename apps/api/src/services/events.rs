//! # Order Completion Pipeline
//!
//! What happens after an order reaches COMPLETED.
//!
//! ```text
//!  OrderService::update_status ── COMPLETED ──► CompletionPipeline::publish
//!                                                  │
//!            ┌─────────────────────────────────────┼───────────────────────┐
//!            ▼ (in request)                        ▼ (in request)          ▼ mpsc (256)
//!     stock listener                        invoice + email          LoyaltyWorker task
//!     decrement each line, clamp at 0       only with an email       retry conflicts x3
//!     lenient: skip missing products        failures logged          failures logged
//!     strict:  all present or nothing
//! ```
//!
//! None of the listeners can fail the request that completed the order. The
//! pipeline returns a [`CompletionReport`] describing what it did.

use serde::{Deserialize, Serialize};
use shopdesk_core::{Money, StockReason};
use shopdesk_db::{Database, DbError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::services::email::{Attachment, Email, Mailer};
use crate::services::invoice::{invoice_filename, render_invoice};
use crate::services::loyalty::LoyaltyService;

/// Capacity of the loyalty queue.
pub const LOYALTY_QUEUE_CAPACITY: usize = 256;

/// Attempts per event before the loyalty worker gives up on a version conflict.
pub const LOYALTY_MAX_ATTEMPTS: u32 = 3;

/// How the stock listener treats lines whose product no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockPolicy {
    /// Skip missing products, decrement the rest.
    #[default]
    Lenient,
    /// Decrement nothing unless every product exists.
    Strict,
}

/// One line of a completed order.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedLine {
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
}

/// Published once per order, when it reaches COMPLETED.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCompleted {
    pub order_id: String,
    pub order_number: String,
    pub customer_username: String,
    pub customer_email: Option<String>,
    /// Order total.
    pub amount: Money,
    pub lines: Vec<CompletedLine>,
    /// Who moved the order to COMPLETED.
    pub completed_by: String,
}

/// Result of the stock listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockOutcome {
    pub adjusted: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionReport {
    pub stock: StockOutcome,
    pub invoice_sent: bool,
    pub loyalty_queued: bool,
}

/// Runs the completion listeners.
#[derive(Clone)]
pub struct CompletionPipeline {
    db: Database,
    stock_policy: StockPolicy,
    mailer: Arc<dyn Mailer>,
    loyalty_tx: mpsc::Sender<OrderCompleted>,
}

impl CompletionPipeline {
    pub fn new(
        db: Database,
        stock_policy: StockPolicy,
        mailer: Arc<dyn Mailer>,
        loyalty_tx: mpsc::Sender<OrderCompleted>,
    ) -> Self {
        CompletionPipeline {
            db,
            stock_policy,
            mailer,
            loyalty_tx,
        }
    }

    pub async fn publish(&self, event: OrderCompleted) -> CompletionReport {
        info!(
            order_number = %event.order_number,
            customer = %event.customer_username,
            amount = %event.amount,
            "Order completed"
        );

        let stock = self.adjust_stock(&event).await;
        let invoice_sent = self.send_invoice(&event).await;

        let loyalty_queued = match self.loyalty_tx.send(event).await {
            Ok(()) => true,
            Err(e) => {
                error!(order_number = %e.0.order_number, "Loyalty worker is gone; points not accrued");
                false
            }
        };

        CompletionReport {
            stock,
            invoice_sent,
            loyalty_queued,
        }
    }

    async fn adjust_stock(&self, event: &OrderCompleted) -> StockOutcome {
        let products = self.db.products();
        let mut outcome = StockOutcome::default();

        if self.stock_policy == StockPolicy::Strict {
            let mut missing = Vec::new();
            for line in &event.lines {
                match products.get_by_id(&line.product_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => missing.push(line.product_id.clone()),
                    Err(e) => {
                        error!(order_number = %event.order_number, error = %e, "Stock check failed");
                        outcome.failed = event.lines.iter().map(|l| l.product_id.clone()).collect();
                        return outcome;
                    }
                }
            }
            if !missing.is_empty() {
                error!(
                    order_number = %event.order_number,
                    missing = ?missing,
                    "Products missing; stock not decremented"
                );
                outcome.skipped = event.lines.iter().map(|l| l.product_id.clone()).collect();
                return outcome;
            }
        }

        for line in &event.lines {
            let result = products
                .adjust_stock(
                    &line.product_id,
                    -line.quantity,
                    StockReason::OrderCompleted,
                    Some(&event.order_id),
                    &event.completed_by,
                )
                .await;

            match result {
                Ok(movement) => {
                    debug!(
                        sku = %line.sku,
                        delta = movement.delta,
                        remaining = movement.quantity_after,
                        "Stock decremented"
                    );
                    outcome.adjusted.push(line.product_id.clone());
                }
                Err(DbError::NotFound { .. }) => {
                    debug!(sku = %line.sku, product_id = %line.product_id, "Product gone; skipping stock decrement");
                    outcome.skipped.push(line.product_id.clone());
                }
                Err(e) => {
                    error!(sku = %line.sku, error = %e, "Stock decrement failed");
                    outcome.failed.push(line.product_id.clone());
                }
            }
        }

        outcome
    }

    async fn send_invoice(&self, event: &OrderCompleted) -> bool {
        let Some(email) = event.customer_email.as_deref() else {
            return false;
        };

        match self.try_send_invoice(event, email).await {
            Ok(()) => true,
            Err(e) => {
                warn!(order_number = %event.order_number, error = %e, "Invoice not sent");
                false
            }
        }
    }

    async fn try_send_invoice(&self, event: &OrderCompleted, to: &str) -> ApiResult<()> {
        let orders = self.db.orders();
        let order = orders
            .get_by_id(&event.order_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Order", &event.order_id))?;
        let items = orders.items(&order.id).await?;
        let pdf = render_invoice(&order, &items)?;

        self.mailer
            .send(Email {
                to: to.to_string(),
                subject: format!("Your invoice for order {}", order.order_number),
                body: format!(
                    "Hello {},\n\nThank you for your order {}. Your invoice is attached.\n\nTotal: {}\n",
                    order.customer_username,
                    order.order_number,
                    order.total()
                ),
                attachment: Some(Attachment {
                    filename: invoice_filename(&order),
                    content_type: "application/pdf".to_string(),
                    bytes: pdf,
                }),
            })
            .await
            .map_err(|e| ApiError::unavailable(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Loyalty worker
// =============================================================================

/// Background consumer of completed orders.
pub struct LoyaltyWorker;

impl LoyaltyWorker {
    /// Creates the queue. Hand the sender to the pipeline and the receiver to
    /// [`LoyaltyWorker::spawn`].
    pub fn channel() -> (mpsc::Sender<OrderCompleted>, mpsc::Receiver<OrderCompleted>) {
        mpsc::channel(LOYALTY_QUEUE_CAPACITY)
    }

    /// Runs until every sender is dropped.
    pub fn spawn(service: LoyaltyService, mut rx: mpsc::Receiver<OrderCompleted>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Loyalty worker started");
            while let Some(event) = rx.recv().await {
                Self::handle(&service, &event).await;
            }
            info!("Loyalty worker stopped");
        })
    }

    async fn handle(service: &LoyaltyService, event: &OrderCompleted) {
        for attempt in 1..=LOYALTY_MAX_ATTEMPTS {
            match service.try_accrue(event).await {
                Ok(_) => return,
                Err(DbError::VersionConflict { .. }) if attempt < LOYALTY_MAX_ATTEMPTS => {
                    warn!(
                        customer = %event.customer_username,
                        attempt,
                        "Loyalty record changed concurrently; retrying"
                    );
                }
                Err(e) => {
                    error!(
                        customer = %event.customer_username,
                        order_number = %event.order_number,
                        attempt,
                        error = %e,
                        "Loyalty accrual failed"
                    );
                    return;
                }
            }
        }
    }
}
