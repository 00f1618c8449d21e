//! Point-of-sale. Staff only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use shopdesk_core::{Sale, SaleDetail};

use crate::auth::{Authorized, Staff};
use crate::error::ApiResult;
use crate::services::sale::{DailyTotal, RecordSaleRequest, SalesStats, TopProduct};
use crate::state::AppState;

const DEFAULT_TOP_LIMIT: usize = 10;
const MAX_TOP_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
struct DateQuery {
    /// `YYYY-MM-DD`; today when absent
    #[serde(default)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
struct TopQuery {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(record))
        .route("/stats/daily", get(daily))
        .route("/stats/top-products", get(top_products))
        .route("/stats/range", get(range))
        .route("/{id}", get(get_one))
}

async fn record(
    Authorized(identity, ..): Authorized<Staff>,
    State(state): State<AppState>,
    Json(body): Json<RecordSaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleDetail>)> {
    let detail = state.services().sales.record_sale(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list(
    _: Authorized<Staff>,
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.services().sales.list(query.date).await?))
}

async fn get_one(
    _: Authorized<Staff>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.services().sales.get(&id).await?))
}

async fn daily(
    _: Authorized<Staff>,
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<DailyTotal>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.services().sales.daily_total(date).await?))
}

async fn top_products(
    _: Authorized<Staff>,
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT);
    Ok(Json(state.services().sales.top_selling_products(limit).await?))
}

async fn range(
    _: Authorized<Staff>,
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<SalesStats>> {
    Ok(Json(state.services().sales.stats_for_range(query.from, query.to).await?))
}
