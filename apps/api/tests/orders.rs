mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use common::{spawn_app, spawn_app_with, TestApp};
use serde_json::{json, Value};
use shopdesk_api::services::email::LogMailer;
use shopdesk_core::Role;

async fn place_order(app: &TestApp, token: &str, product_id: &str, quantity: i64) -> (StatusCode, Value) {
    app.post(
        "/api/orders",
        Some(token),
        json!({
            "payment_method": "card",
            "items": [{ "product_id": product_id, "quantity": quantity }],
        }),
    )
    .await
}

async fn set_status(app: &TestApp, token: &str, order_id: &str, status: &str) -> (StatusCode, Value) {
    app.json(
        Method::PUT,
        &format!("/api/orders/{order_id}/status"),
        Some(token),
        Some(json!({ "status": status })),
    )
    .await
}

async fn stock_of(app: &TestApp, product_id: &str) -> i64 {
    let (_, body) = app.get(&format!("/api/products/{product_id}"), None).await;
    body["stock_quantity"].as_i64().unwrap()
}

/// The worker runs off the request path, so give it a moment.
async fn wait_for_points(app: &TestApp, token: &str, expected: i64) -> Value {
    let mut last = Value::Null;
    for _ in 0..50 {
        let (status, body) = app.get("/api/loyalty/me", Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        if body["points"].as_i64() == Some(expected) {
            return body;
        }
        last = body;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("loyalty never reached {expected} points; last read {last}");
}

#[tokio::test]
async fn order_totals_and_stock_follow_completion() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let customer = app.token_for("ana", vec![Role::Customer]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 3).await;

    let (status, order) = place_order(&app, &customer, &product_id, 2).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["subtotal_cents"], 2000);
    assert_eq!(order["tax_cents"], 400);
    assert_eq!(order["shipping_cents"], 500);
    assert_eq!(order["total_cents"], 2900);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["customer_username"], "ana");
    let order_id = order["id"].as_str().unwrap().to_string();

    // Stock is only taken at completion
    assert_eq!(stock_of(&app, &product_id).await, 3);

    let (status, _) = set_status(&app, &customer, &order_id, "COMPLETED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = set_status(&app, &manager, &order_id, "COMPLETED").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(stock_of(&app, &product_id).await, 1);

    // 29.00 earns 5 points
    let loyalty = wait_for_points(&app, &customer, 5).await;
    assert_eq!(loyalty["tier"], "BRONZE");

    let (status, body) = set_status(&app, &manager, &order_id, "COMPLETED").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OPERATION");
    assert_eq!(stock_of(&app, &product_id).await, 1);
}

#[tokio::test]
async fn zero_shipping_fee_is_configurable() {
    let app = spawn_app_with(&[("pricing.shipping_fee_cents", "0")], Arc::new(LogMailer)).await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 3).await;

    let (status, order) = place_order(&app, &manager, &product_id, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total_cents"], 2400);
}

#[tokio::test]
async fn completed_order_of_37_earns_7_points() {
    // 2 x 12.50 = 25.00, + 5.00 VAT, + 7.00 shipping = 37.00
    let app = spawn_app_with(&[("pricing.shipping_fee_cents", "700")], Arc::new(LogMailer)).await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let customer = app.token_for("ana", vec![Role::Customer]).await;
    let product_id = app.create_product(&manager, "SKU-7", 1250, 10).await;

    let (_, order) = place_order(&app, &customer, &product_id, 2).await;
    assert_eq!(order["total_cents"], 3700);
    let order_id = order["id"].as_str().unwrap();

    let (status, _) = set_status(&app, &manager, order_id, "COMPLETED").await;
    assert_eq!(status, StatusCode::OK);

    let loyalty = wait_for_points(&app, &customer, 7).await;
    assert_eq!(loyalty["tier"], "BRONZE");

    let (status, progress) = app.get("/api/loyalty/ana/progress", Some(&manager)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["next_tier"], "SILVER");
    assert_eq!(progress["points_to_next_tier"], 93);
}

#[tokio::test]
async fn insufficient_stock_writes_nothing() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 3).await;

    let (status, body) = app
        .post(
            "/api/orders",
            Some(&manager),
            json!({
                "payment_method": "card",
                "items": [
                    { "product_id": product_id, "quantity": 2 },
                    { "product_id": product_id, "quantity": 2 },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (_, orders) = app.get("/api/orders", Some(&manager)).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let ana = app.token_for("ana", vec![Role::Customer]).await;
    let bob = app.token_for("bob", vec![Role::Customer]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 10).await;

    let (_, order) = place_order(&app, &ana, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/api/orders/{order_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, list) = app.get("/api/orders", Some(&bob)).await;
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = app.get(&format!("/api/orders/{order_id}"), Some(&ana)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = app.get("/api/orders", Some(&manager)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_without_reason_uses_default() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 10).await;
    let (_, order) = place_order(&app, &manager, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, body) = app
        .json(Method::POST, &format!("/api/orders/{order_id}/cancel"), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(body["cancel_reason"], "No reason provided");
}

#[tokio::test]
async fn invoice_is_a_pdf() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 10).await;
    let (_, order) = place_order(&app, &manager, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap();

    let request = axum::http::Request::builder()
        .uri(format!("/api/orders/{order_id}/invoice"))
        .header(header::AUTHORIZATION, format!("Bearer {manager}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn paypal_without_configuration_is_unavailable() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let product_id = app.create_product(&manager, "SKU-1", 1000, 10).await;
    let (_, order) = place_order(&app, &manager, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, body) = app
        .json(Method::POST, &format!("/api/orders/{order_id}/paypal"), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}
