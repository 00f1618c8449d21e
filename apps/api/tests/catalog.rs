mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use common::{spawn_app, TestApp};
use serde_json::json;
use shopdesk_core::Role;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-pixels";

async fn upload_image(app: &TestApp, token: &str, product_id: &str) -> (StatusCode, serde_json::Value) {
    let boundary = "shopdesk-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"p.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(PNG);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/products/{product_id}/image"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();
    let response = app.send(request).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or_default())
}

#[tokio::test]
async fn archived_category_is_hidden_but_readable() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;

    let (status, category) = app
        .post("/api/categories", Some(&manager), json!({ "name": "Dairy", "description": "Milk and cheese" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = category["id"].as_str().unwrap();

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/categories/{id}"), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app.get("/api/categories", None).await;
    assert!(list.as_array().unwrap().is_empty());
    let (_, found) = app.get("/api/categories/search?q=dai", None).await;
    assert!(found.as_array().unwrap().is_empty());

    let (_, all) = app.get("/api/categories?include_archived=true", None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, archived) = app.get(&format!("/api/categories/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["status"], "archived");

    let (status, restored) = app
        .json(Method::POST, &format!("/api/categories/{id}/restore"), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["status"], "active");
    let (_, list) = app.get("/api/categories", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn catalog_writes_need_management() {
    let app = spawn_app().await;
    let employee = app.token_for("eli", vec![Role::Employee]).await;

    let (status, _) = app
        .post("/api/suppliers", Some(&employee), json!({ "name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/suppliers", None, json!({ "name": "Acme" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn archive_and_restore_are_audited() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;

    let (_, supplier) = app
        .post("/api/suppliers", Some(&manager), json!({ "name": "Acme", "email": "sales@acme.test" }))
        .await;
    let id = supplier["id"].as_str().unwrap();
    app.json(Method::DELETE, &format!("/api/suppliers/{id}"), Some(&manager), None)
        .await;
    app.json(Method::POST, &format!("/api/suppliers/{id}/restore"), Some(&manager), None)
        .await;

    let (status, entries) = app
        .get(&format!("/api/audit?entity_type=Supplier&entity_id={id}"), Some(&manager))
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut actions: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    actions.sort_unstable();
    assert_eq!(actions, vec!["CREATE", "DELETE", "RESTORE"]);
    assert!(entries.as_array().unwrap().iter().all(|e| e["actor"] == "mia"));
}

#[tokio::test]
async fn product_image_is_served_through_signed_url() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let product_id = app.create_product(&manager, "SKU-IMG", 1000, 1).await;

    let (status, image) = upload_image(&app, &manager, &product_id).await;
    assert_eq!(status, StatusCode::OK, "{image}");
    let url = image["url"].as_str().unwrap();
    let path = &url[url.find("/api/images/").unwrap()..];

    let response = app
        .send(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PNG);

    let tampered = path.replace("signature=", "signature=00");
    let (status, _) = app.get(&tampered, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/products/{product_id}/image"), Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stock_adjustments_feed_low_stock() {
    let app = spawn_app().await;
    let manager = app.token_for("mia", vec![Role::Manager]).await;
    let employee = app.token_for("eli", vec![Role::Employee]).await;
    let product_id = app.create_product(&manager, "SKU-LOW", 1000, 10).await;

    let (status, movement) = app
        .post(
            &format!("/api/products/{product_id}/stock"),
            Some(&employee),
            json!({ "delta": -10 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{movement}");
    assert_eq!(movement["quantity_before"], 10);
    assert_eq!(movement["quantity_after"], 0);

    let (_, low) = app.get("/api/products/low-stock", Some(&employee)).await;
    let skus: Vec<&str> = low.as_array().unwrap().iter().filter_map(|p| p["sku"].as_str()).collect();
    assert_eq!(skus, vec!["SKU-LOW"]);

    let (_, movements) = app
        .get(&format!("/api/products/{product_id}/movements"), Some(&employee))
        .await;
    assert_eq!(movements.as_array().unwrap().len(), 1);
}
