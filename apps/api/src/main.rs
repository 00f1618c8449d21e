//! # Shopdesk API server
//!
//! ```text
//! .env ─► config ─► tracing ─► SQLite + migrations ─► bootstrap admin
//!      ─► mailer / storage / PayPal ─► loyalty worker ─► axum (graceful)
//! ```

use std::sync::Arc;

use anyhow::Context;
use shopdesk_api::config::{AppConfig, LogFormat};
use shopdesk_api::services::email::{LogMailer, Mailer, SmtpMailer};
use shopdesk_api::services::events::LoyaltyWorker;
use shopdesk_api::services::storage::{LocalBucketStore, ObjectStore};
use shopdesk_api::AppState;
use shopdesk_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,shopdesk=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Shopdesk API...");
    if config.uses_dev_secret() {
        warn!("Using the development JWT secret; set SHOPDESK_AUTH__JWT_SECRET in production");
    }

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await
    .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    info!(path = %config.database.path, "Database ready");

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "SMTP configured");
            Arc::new(SmtpMailer::new(smtp).context("Failed to configure SMTP")?)
        }
        None => {
            warn!("SMTP not configured; emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    let store: Arc<dyn ObjectStore> = Arc::new(LocalBucketStore::new(&config.storage));
    if config.paypal.is_none() {
        warn!("PayPal not configured; payment endpoints will answer 503");
    }

    let addr = config.server.socket_addr()?;
    let bootstrap = config.bootstrap_admin.clone();

    let (state, loyalty_rx) = AppState::new(config, db.clone(), mailer, store)
        .map_err(|e| anyhow::anyhow!("Failed to build application state: {e}"))?;

    if let Some(admin) = bootstrap {
        state
            .services()
            .users
            .bootstrap_admin(&admin)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin: {e}"))?;
    }

    let worker = LoyaltyWorker::spawn(state.services().loyalty.clone(), loyalty_rx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, shopdesk_api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router (and with it every sender) is gone, so the worker drains and exits
    if let Err(e) = worker.await {
        warn!(error = %e, "Loyalty worker ended abnormally");
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
