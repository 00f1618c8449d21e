use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shopdesk_core::AuditEntry;
use shopdesk_db::AuditFilter;

use crate::auth::{Authorized, Management};
use crate::error::ApiResult;
use crate::state::AppState;

const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
struct AuditQuery {
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

impl From<AuditQuery> for AuditFilter {
    fn from(query: AuditQuery) -> Self {
        let defaults = AuditFilter::default();
        AuditFilter {
            entity_type: query.entity_type,
            entity_id: query.entity_id,
            actor: query.actor,
            limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_LIMIT),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list))
}

/// Newest first.
async fn list(
    _: Authorized<Management>,
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let filter = AuditFilter::from(query);
    Ok(Json(state.services().audit.list(&filter).await?))
}
