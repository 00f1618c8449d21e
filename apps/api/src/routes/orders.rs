//! Online orders. Any authenticated user; customers only see and act on
//! their own orders. Status changes need staff.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use shopdesk_core::{Order, OrderDetail, OrderStatus};

use crate::auth::{AnyUser, Authorized, Staff};
use crate::error::{ApiError, ApiResult};
use crate::services::order::{CreateOrderRequest, StatusUpdateRequest};
use crate::services::payment::PaymentOutcome;
use crate::services::paypal::CreatedPayment;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: Option<OrderStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct CancelRequest {
    #[serde(default)]
    reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one))
        .route("/{id}/status", put(update_status))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/invoice", get(invoice))
        .route("/{id}/paypal", post(create_paypal))
        .route("/{id}/paypal/capture", post(capture_paypal))
}

async fn list(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.services().orders.list(&identity, query.status).await?))
}

async fn create(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderDetail>)> {
    let detail = state.services().orders.create(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_one(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(state.services().orders.get(&identity, &id).await?))
}

async fn update_status(
    Authorized(identity, ..): Authorized<Staff>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> ApiResult<Json<OrderDetail>> {
    let detail = state
        .services()
        .orders
        .update_status(&identity, &id, body.status, body.reason)
        .await?;
    Ok(Json(detail))
}

async fn cancel(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<OrderDetail>> {
    // The body is optional
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<CancelRequest>(&body)
            .map_err(|e| ApiError::validation(format!("Invalid request body: {e}")))?
            .reason
    };
    Ok(Json(state.services().orders.cancel(&identity, &id, reason).await?))
}

async fn invoice(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (filename, pdf) = state.services().orders.invoice(&identity, &id).await?;
    let disposition = format!("attachment; filename=\"{filename}\"");
    if !disposition.is_ascii() {
        return Err(ApiError::internal("Invoice file name is not ASCII"));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    ))
}

async fn create_paypal(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CreatedPayment>> {
    Ok(Json(state.services().payments.create_paypal(&identity, &id).await?))
}

async fn capture_paypal(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PaymentOutcome>> {
    Ok(Json(state.services().payments.capture_paypal(&identity, &id).await?))
}
