//! Business services.
//!
//! Handlers stay thin: they extract, authorize and call one service method.
//! Every method that acts on behalf of a caller takes the caller's
//! [`Identity`](shopdesk_core::Identity) explicitly.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ auth, user   │   │ catalog,     │   │ order, sale, │
//! │              │   │ product      │   │ payment      │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │ COMPLETED
//!        ▼                  ▼                  ▼
//!      audit ◄──────────────┴──────────  events (stock, invoice+email,
//!                                               loyalty worker)
//! ```

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod email;
pub mod events;
pub mod invoice;
pub mod loyalty;
pub mod order;
pub mod payment;
pub mod paypal;
pub mod product;
pub mod sale;
pub mod storage;
pub mod user;

use std::sync::Arc;

use shopdesk_db::Database;

use crate::auth::JwtManager;
use crate::config::AppConfig;
use audit::AuditService;
use auth::AuthService;
use catalog::CatalogService;
use dashboard::DashboardService;
use email::Mailer;
use events::{CompletionPipeline, OrderCompleted};
use loyalty::LoyaltyService;
use order::OrderService;
use payment::PaymentService;
use paypal::PaypalClient;
use product::ProductService;
use sale::SaleService;
use storage::ObjectStore;
use user::UserService;

/// Trimmed value, or `None` when absent or blank.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Every service, wired once at startup.
#[derive(Clone)]
pub struct Services {
    pub audit: AuditService,
    pub auth: AuthService,
    pub users: UserService,
    pub catalog: CatalogService,
    pub products: ProductService,
    pub orders: OrderService,
    pub sales: SaleService,
    pub payments: PaymentService,
    pub loyalty: LoyaltyService,
    pub dashboard: DashboardService,
}

impl Services {
    pub fn new(
        config: &AppConfig,
        db: &Database,
        jwt: JwtManager,
        mailer: Arc<dyn Mailer>,
        store: Arc<dyn ObjectStore>,
        paypal: Option<PaypalClient>,
        loyalty_tx: tokio::sync::mpsc::Sender<OrderCompleted>,
    ) -> Self {
        let audit = AuditService::new(db.clone());
        let pipeline = CompletionPipeline::new(db.clone(), config.stock_policy, mailer.clone(), loyalty_tx);
        let orders = OrderService::new(db.clone(), config.pricing, audit.clone(), pipeline);

        Services {
            auth: AuthService::new(db.clone(), jwt, audit.clone()),
            users: UserService::new(db.clone(), audit.clone(), mailer),
            catalog: CatalogService::new(db.clone(), audit.clone()),
            products: ProductService::new(db.clone(), audit.clone(), store, config.storage.url_ttl),
            payments: PaymentService::new(db.clone(), orders.clone(), paypal, audit.clone()),
            orders,
            sales: SaleService::new(db.clone(), config.pricing, audit.clone()),
            loyalty: LoyaltyService::new(db.clone()),
            dashboard: DashboardService::new(db.clone()),
            audit,
        }
    }
}
