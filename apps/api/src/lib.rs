//! # Shopdesk API
//!
//! HTTP/JSON back office for a small retail shop.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Shopdesk API                                   │
//! │                                                                         │
//! │  request ──► TraceLayer ──► resolve_identity ──► Authorized<P> ──► handler
//! │                                                                    │    │
//! │  ┌─────────────────────────────────────────────────────────────────▼──┐ │
//! │  │ services: auth · users · catalog · products · orders · sales ·     │ │
//! │  │           payments · loyalty · dashboard · audit                   │ │
//! │  └───────┬──────────────────────┬───────────────────────┬────────────┘ │
//! │          │                      │                       │              │
//! │   ┌──────▼───────┐   ┌──────────▼──────────┐   ┌────────▼─────────┐    │
//! │   │ shopdesk-db  │   │ completion pipeline │   │ integrations     │    │
//! │   │ (SQLite)     │   │ stock · invoice ·   │   │ SMTP · PayPal ·  │    │
//! │   │              │   │ loyalty worker      │   │ bucket storage   │    │
//! │   └──────────────┘   └─────────────────────┘   └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: defaults, then `shopdesk.toml`, then `SHOPDESK_*`
//! environment variables (`SHOPDESK_AUTH__JWT_SECRET`, ...).

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// The application router with every route and layer attached.
pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
}
