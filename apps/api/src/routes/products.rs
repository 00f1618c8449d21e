//! Products, stock and images.
//!
//! ```text
//! POST /api/products/{id}/image   multipart, one part named "file"
//!                                 image/png | image/jpeg | image/webp, <= 5 MiB
//! GET  /api/products/{id}/image   presigned URL (anonymous)
//! ```

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shopdesk_core::{Product, StockMovement, Visibility};
use shopdesk_db::ProductFilter;

use super::SearchQuery;
use crate::auth::{Authorized, Management, Staff};
use crate::error::{ApiError, ApiResult};
use crate::services::product::{ProductImage, ProductInput, StockAdjustment, MAX_IMAGE_BYTES};
use crate::state::AppState;

/// Multipart framing on top of the image itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    supplier_id: Option<String>,
    #[serde(default)]
    include_archived: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/low-stock", get(low_stock))
        .route("/sku/{sku}", get(get_by_sku))
        .route("/{id}", get(get_one).put(update).delete(archive))
        .route("/{id}/restore", post(restore))
        .route("/{id}/stock", post(adjust_stock))
        .route("/{id}/movements", get(movements))
        .route(
            "/{id}/image",
            get(image_url)
                .post(upload_image)
                .delete(delete_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + UPLOAD_OVERHEAD_BYTES)),
        )
}

async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Json<Vec<Product>>> {
    let filter = ProductFilter {
        category_id: query.category_id,
        supplier_id: query.supplier_id,
    };
    let visibility = Visibility::from_flag(query.include_archived);
    Ok(Json(state.services().products.list(&filter, visibility).await?))
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Json<Vec<Product>>> {
    let visibility = Visibility::from_flag(query.include_archived);
    Ok(Json(state.services().products.search(&query.q, visibility).await?))
}

async fn low_stock(_: Authorized<Staff>, State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.services().products.low_stock().await?))
}

async fn get_by_sku(State(state): State<AppState>, Path(sku): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(state.services().products.get_by_sku(&sku).await?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(state.services().products.get(&id).await?))
}

async fn create(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Json(body): Json<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.services().products.create(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProductInput>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.services().products.update(&identity, &id, body).await?))
}

async fn archive(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services().products.archive(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restore(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.services().products.restore(&identity, &id).await?))
}

async fn adjust_stock(
    Authorized(identity, ..): Authorized<Staff>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustment>,
) -> ApiResult<Json<StockMovement>> {
    Ok(Json(state.services().products.adjust_stock(&identity, &id, body).await?))
}

async fn movements(
    _: Authorized<Staff>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StockMovement>>> {
    Ok(Json(state.services().products.movements(&id).await?))
}

async fn image_url(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ProductImage>> {
    Ok(Json(state.services().products.image_url(&id).await?))
}

async fn upload_image(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<ProductImage>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::validation("Image part has no content type"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read image: {e}")))?;

        let image = state
            .services()
            .products
            .upload_image(&identity, &id, &content_type, &bytes)
            .await?;
        return Ok(Json(image));
    }

    Err(ApiError::validation("Missing multipart field \"file\""))
}

async fn delete_image(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services().products.delete_image(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
