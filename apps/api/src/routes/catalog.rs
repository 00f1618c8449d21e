//! Categories and suppliers. Reads are public, writes need management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shopdesk_core::{Category, Supplier, Visibility};

use super::{ArchivedQuery, SearchQuery};
use crate::auth::{Authorized, Management};
use crate::error::ApiResult;
use crate::services::catalog::{CategoryInput, SupplierInput};
use crate::state::AppState;

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/search", get(search_categories))
        .route("/{id}", get(get_category).put(update_category).delete(archive_category))
        .route("/{id}/restore", post(restore_category))
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/search", get(search_suppliers))
        .route("/{id}", get(get_supplier).put(update_supplier).delete(archive_supplier))
        .route("/{id}/restore", post(restore_supplier))
}

// =============================================================================
// Categories
// =============================================================================

async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ArchivedQuery>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.services().catalog.list_categories(query.visibility()).await?))
}

async fn search_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Category>>> {
    let visibility = Visibility::from_flag(query.include_archived);
    Ok(Json(state.services().catalog.search_categories(&query.q, visibility).await?))
}

async fn get_category(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Category>> {
    Ok(Json(state.services().catalog.get_category(&id).await?))
}

async fn create_category(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Json(body): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.services().catalog.create_category(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CategoryInput>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.services().catalog.update_category(&identity, &id, body).await?))
}

async fn archive_category(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services().catalog.archive_category(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restore_category(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.services().catalog.restore_category(&identity, &id).await?))
}

// =============================================================================
// Suppliers
// =============================================================================

async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ArchivedQuery>,
) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.services().catalog.list_suppliers(query.visibility()).await?))
}

async fn search_suppliers(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Supplier>>> {
    let visibility = Visibility::from_flag(query.include_archived);
    Ok(Json(state.services().catalog.search_suppliers(&query.q, visibility).await?))
}

async fn get_supplier(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.services().catalog.get_supplier(&id).await?))
}

async fn create_supplier(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Json(body): Json<SupplierInput>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.services().catalog.create_supplier(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

async fn update_supplier(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SupplierInput>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.services().catalog.update_supplier(&identity, &id, body).await?))
}

async fn archive_supplier(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services().catalog.archive_supplier(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restore_supplier(
    Authorized(identity, ..): Authorized<Management>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.services().catalog.restore_supplier(&identity, &id).await?))
}
