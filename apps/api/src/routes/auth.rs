//! Login, refresh, logout and self-registration.
//!
//! The refresh token travels only in an `HttpOnly` cookie scoped to
//! `/api/auth`; the access token is returned in the body.

use axum::{
    extract::State,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{AppendHeaders, IntoResponse},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use shopdesk_core::User;

use crate::error::{ApiError, ApiResult};
use crate::services::auth::{AccessToken, IssuedTokens};
use crate::services::user::RegisterRequest;
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";
const COOKIE_PATH: &str = "/api/auth";

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh))
        .route("/logout", post(logout))
        .route("/register", post(register))
}

fn refresh_cookie(value: &str, max_age: i64, secure: bool) -> ApiResult<HeaderValue> {
    let mut cookie = format!("{REFRESH_COOKIE}={value}; HttpOnly; SameSite=Strict; Path={COOKIE_PATH}; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal(format!("Invalid cookie header: {e}")))
}

/// Value of the refresh cookie, if the request carries one.
fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn with_cookie(
    state: &AppState,
    tokens: IssuedTokens,
) -> ApiResult<(AppendHeaders<[(axum::http::HeaderName, HeaderValue); 1]>, Json<AccessToken>)> {
    let cookie = refresh_cookie(
        &tokens.refresh_token,
        state.jwt().refresh_lifetime_secs(),
        state.config().auth.cookie_secure,
    )?;
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(tokens.access)))
}

async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> ApiResult<impl IntoResponse> {
    let tokens = state.services().auth.login(&body.username, &body.password).await?;
    with_cookie(&state, tokens)
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let token = read_refresh_cookie(&headers).ok_or_else(|| ApiError::invalid_token("Missing refresh token"))?;
    let tokens = state.services().auth.refresh(&token).await?;
    with_cookie(&state, tokens)
}

async fn logout(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cookie = refresh_cookie("", 0, state.config().auth.cookie_secure)?;
    Ok((StatusCode::NO_CONTENT, AppendHeaders([(SET_COOKIE, cookie)])))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.services().users.register(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
