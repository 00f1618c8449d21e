//! Application state shared across handlers.
//!
//! Cheap to clone: one `Arc` around everything. Integrations that tests need
//! to replace (mailer, object store) are injected rather than built here.

use std::sync::Arc;

use shopdesk_db::Database;
use tokio::sync::mpsc;

use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::email::Mailer;
use crate::services::events::{LoyaltyWorker, OrderCompleted};
use crate::services::paypal::PaypalClient;
use crate::services::storage::ObjectStore;
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    db: Database,
    jwt: JwtManager,
    store: Arc<dyn ObjectStore>,
    services: Services,
}

impl AppState {
    /// Wires every service. The returned receiver belongs to the loyalty
    /// worker; hand it to [`LoyaltyWorker::spawn`].
    pub fn new(
        config: AppConfig,
        db: Database,
        mailer: Arc<dyn Mailer>,
        store: Arc<dyn ObjectStore>,
    ) -> ApiResult<(Self, mpsc::Receiver<OrderCompleted>)> {
        let jwt = JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.access_token_secs,
            config.auth.refresh_token_secs,
        );

        let paypal = config
            .paypal
            .clone()
            .map(PaypalClient::new)
            .transpose()
            .map_err(|e| ApiError::internal(format!("Failed to build PayPal client: {e}")))?;

        let (loyalty_tx, loyalty_rx) = LoyaltyWorker::channel();
        let services = Services::new(&config, &db, jwt.clone(), mailer, store.clone(), paypal, loyalty_tx);

        let state = AppState {
            inner: Arc::new(AppStateInner {
                config,
                db,
                jwt,
                store,
                services,
            }),
        };
        Ok((state, loyalty_rx))
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.inner.jwt
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }
}
