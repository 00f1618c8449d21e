use axum::{extract::State, routing::get, Json, Router};

use crate::auth::{Authorized, Staff};
use crate::error::ApiResult;
use crate::services::dashboard::DashboardSummary;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(summary))
}

async fn summary(_: Authorized<Staff>, State(state): State<AppState>) -> ApiResult<Json<DashboardSummary>> {
    Ok(Json(state.services().dashboard.summary().await?))
}
