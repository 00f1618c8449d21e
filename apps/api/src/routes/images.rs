//! Signed, anonymous image downloads.
//!
//! URLs come from `GET /api/products/{id}/image`; the signature covers the
//! key and the expiry, so neither can be altered.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SignedQuery {
    expires: i64,
    signature: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/{*key}", get(fetch))
}

async fn fetch(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> ApiResult<impl IntoResponse> {
    if !state.store().verify(&key, query.expires, &query.signature) {
        debug!(key = %key, "Rejected image URL");
        return Err(ApiError::forbidden("Invalid or expired image URL"));
    }

    let object = state
        .store()
        .get(&key)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read image {key}: {e}")))?
        .ok_or_else(|| ApiError::not_found("Image", &key))?;

    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, "private, max-age=300"),
        ],
        object.bytes,
    ))
}
