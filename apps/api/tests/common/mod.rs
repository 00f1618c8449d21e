//! Shared setup for the HTTP tests: an in-memory database, a temporary
//! bucket directory and the full router, driven with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use config::Config;
use serde_json::Value;
use shopdesk_api::auth::password::hash_password;
use shopdesk_api::config::AppConfig;
use shopdesk_api::services::email::{LogMailer, Mailer};
use shopdesk_api::services::events::LoyaltyWorker;
use shopdesk_api::services::storage::{LocalBucketStore, ObjectStore};
use shopdesk_api::AppState;
use shopdesk_core::{Role, User};
use shopdesk_db::repository::new_id;
use shopdesk_db::{Database, DbConfig};
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _bucket: TempDir,
}

/// Overrides applied on top of the defaults, e.g. `("pricing.shipping_fee_cents", "0")`.
pub async fn spawn_app_with(overrides: &[(&str, &str)], mailer: Arc<dyn Mailer>) -> TestApp {
    let bucket = TempDir::new().unwrap();

    let mut builder = Config::builder()
        .set_override("auth.jwt_secret", JWT_SECRET)
        .unwrap()
        .set_override("storage.root", bucket.path().to_string_lossy().to_string())
        .unwrap();
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value).unwrap();
    }
    let config = AppConfig::from_builder(builder).unwrap();

    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalBucketStore::new(&config.storage));
    let (state, loyalty_rx) = AppState::new(config, db, mailer, store).unwrap();
    LoyaltyWorker::spawn(state.services().loyalty.clone(), loyalty_rx);

    TestApp {
        router: shopdesk_api::app(state.clone()),
        state,
        _bucket: bucket,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[], Arc::new(LogMailer)).await
}

impl TestApp {
    pub async fn seed_user(&self, username: &str, password: &str, roles: Vec<Role>) {
        let now = Utc::now();
        self.state
            .db()
            .users()
            .insert(&User {
                id: new_id(),
                username: username.to_string(),
                email: Some(format!("{username}@example.com")),
                password_hash: hash_password(password).unwrap(),
                roles,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    /// Seeds a user and returns an access token for it.
    pub async fn token_for(&self, username: &str, roles: Vec<Role>) -> String {
        let password = format!("{username}-password");
        self.seed_user(username, &password, roles).await;

        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// JSON request; the response body is parsed as JSON (`Null` when empty).
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, token, Some(body)).await
    }

    /// Creates a product through the API and returns its id.
    pub async fn create_product(&self, token: &str, sku: &str, price_cents: i64, stock: i64) -> String {
        let (status, body) = self
            .post(
                "/api/products",
                Some(token),
                serde_json::json!({
                    "sku": sku,
                    "name": format!("Product {sku}"),
                    "purchase_price_cents": price_cents / 2,
                    "selling_price_cents": price_cents,
                    "stock_quantity": stock,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "product create failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }
}
