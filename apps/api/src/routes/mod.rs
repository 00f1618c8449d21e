//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              liveness + database
//!
//! POST   /api/auth/login                      anonymous
//! POST   /api/auth/refresh-token              anonymous (refresh cookie)
//! POST   /api/auth/logout                     anonymous
//! POST   /api/auth/register                   anonymous
//!
//! GET    /api/users                           admin
//! POST   /api/users                           admin
//! GET    /api/users/me                        any user
//! PUT    /api/users/me/password               any user
//! GET    /api/users/{id}                      admin
//! PUT    /api/users/{id}/roles                admin
//! DELETE /api/users/{id}                      admin
//!
//! /api/categories, /api/suppliers             read: anonymous, write: management
//! /api/products                               read: anonymous, write: management,
//!                                             stock + low-stock: staff
//! /api/orders                                 any user (customers scoped)
//! /api/sales                                  staff
//! /api/loyalty                                any user (customers scoped)
//! /api/audit                                  management
//! /api/dashboard                              staff
//! GET    /api/images/{*key}                   anonymous, signed URL
//! ```

mod audit;
mod auth;
mod catalog;
mod dashboard;
mod health;
mod images;
mod loyalty;
mod orders;
mod products;
mod sales;
mod users;

use axum::{middleware, Router};
use serde::Deserialize;
use shopdesk_core::Visibility;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::resolve_identity;
use crate::state::AppState;

/// `?include_archived=true` on catalog listings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ArchivedQuery {
    #[serde(default)]
    pub include_archived: bool,
}

impl ArchivedQuery {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_flag(self.include_archived)
    }
}

/// `?q=...&include_archived=...` on catalog search.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub include_archived: bool,
}

/// The full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth::routes())
        .nest("/users", users::routes())
        .nest("/categories", catalog::category_routes())
        .nest("/suppliers", catalog::supplier_routes())
        .nest("/products", products::routes())
        .nest("/orders", orders::routes())
        .nest("/sales", sales::routes())
        .nest("/loyalty", loyalty::routes())
        .nest("/audit", audit::routes())
        .nest("/dashboard", dashboard::routes())
        .nest("/images", images::routes());

    Router::new()
        .merge(health::routes())
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
