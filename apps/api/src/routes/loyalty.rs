use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use shopdesk_core::LoyaltyProgress;

use crate::auth::{AnyUser, Authorized};
use crate::error::ApiResult;
use crate::services::loyalty::LoyaltySummary;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/{username}", get(summary))
        .route("/{username}/progress", get(progress))
}

async fn me(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
) -> ApiResult<Json<LoyaltySummary>> {
    let username = identity.username.clone();
    Ok(Json(state.services().loyalty.summary(&identity, &username).await?))
}

/// Staff may read anyone; customers only themselves.
async fn summary(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<LoyaltySummary>> {
    Ok(Json(state.services().loyalty.summary(&identity, &username).await?))
}

async fn progress(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<LoyaltyProgress>> {
    Ok(Json(state.services().loyalty.progress(&identity, &username).await?))
}
