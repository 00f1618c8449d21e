//! Identity resolution middleware.
//!
//! ```text
//!  Authorization header        outcome
//!  ───────────────────────     ───────────────────────────────────────────
//!  absent                      continue anonymous
//!  Bearer <valid access>       Identity inserted into request extensions
//!  anything else               warn!, continue anonymous
//! ```
//!
//! This layer never rejects a request. Whether anonymous callers may reach a
//! route is decided by the route's [`Authorized`](super::policy::Authorized)
//! extractor, so a stale token sent to a public route still succeeds.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::jwt::extract_bearer_token;
use crate::state::AppState;

pub async fn resolve_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map(str::to_owned));

    match header {
        None => {}
        Some(Err(_)) => warn!("Authorization header is not valid ASCII; continuing anonymous"),
        Some(Ok(value)) => match extract_bearer_token(&value) {
            None => warn!("Authorization header is not a bearer token; continuing anonymous"),
            Some(token) => match state.jwt().validate_access_token(token) {
                Ok(claims) => {
                    debug!(username = %claims.sub, "Request authenticated");
                    req.extensions_mut().insert(claims.identity());
                }
                Err(e) => warn!(error = %e.message, "Rejected bearer token; continuing anonymous"),
            },
        },
    }

    next.run(req).await
}
