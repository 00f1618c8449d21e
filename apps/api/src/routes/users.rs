use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use shopdesk_core::User;

use crate::auth::{AdminOnly, AnyUser, Authorized};
use crate::error::ApiResult;
use crate::services::user::{ChangePasswordRequest, CreateUserRequest, RolesRequest};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/me", get(me))
        .route("/me/password", put(change_password))
        .route("/{id}", get(get_one).delete(delete))
        .route("/{id}/roles", put(replace_roles))
}

async fn list(_: Authorized<AdminOnly>, State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.services().users.list().await?))
}

async fn create(
    Authorized(identity, ..): Authorized<AdminOnly>,
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.services().users.create(&identity, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_one(
    _: Authorized<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.services().users.get(&id).await?))
}

async fn replace_roles(
    Authorized(identity, ..): Authorized<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RolesRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.services().users.replace_roles(&identity, &id, body.roles).await?))
}

async fn delete(
    Authorized(identity, ..): Authorized<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services().users.delete(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(Authorized(identity, ..): Authorized<AnyUser>, State(state): State<AppState>) -> ApiResult<Json<User>> {
    Ok(Json(state.services().users.me(&identity).await?))
}

async fn change_password(
    Authorized(identity, ..): Authorized<AnyUser>,
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state.services().users.change_password(&identity, body).await?;
    Ok(StatusCode::NO_CONTENT)
}
