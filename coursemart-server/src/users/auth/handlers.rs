use axum::{
    Extension, Json,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use coursemart_core::{
    api_types::ApiResponse,
    domain::users::{
        auth::{AuthSession, LoginRequest, RegisterRequest, TokenPair},
        identity::PublicUser,
    },
};
use serde::Deserialize;

use super::cookies::{
    REFRESH_TOKEN_COOKIE, clear_session_cookies, read_cookie, set_session_cookies,
};
use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

type Envelope<T> = (StatusCode, HeaderMap, Json<ApiResponse<T>>);

/// Cookie first, then the JSON body.
fn incoming_refresh_token(headers: &HeaderMap, body: &Bytes) -> Option<String> {
    read_cookie(headers, REFRESH_TOKEN_COOKIE).or_else(|| {
        serde_json::from_slice::<RefreshTokenRequest>(body)
            .ok()
            .and_then(|request| request.refresh_token)
    })
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Envelope<AuthSession>> {
    let Json(request) = payload?;
    let session = state.sessions().register(request).await?;

    Ok((
        StatusCode::CREATED,
        HeaderMap::new(),
        Json(ApiResponse::success(session).with_message("User registered successfully")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Envelope<AuthSession>> {
    let Json(request) = payload?;
    let session = state.sessions().login(request).await?;

    let mut headers = HeaderMap::new();
    set_session_cookies(
        &mut headers,
        &session.access_token,
        &session.refresh_token,
        state.secure_cookies(),
    );

    Ok((
        StatusCode::OK,
        headers,
        Json(ApiResponse::success(session).with_message("User logged in successfully")),
    ))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Bytes,
) -> AppResult<Envelope<TokenPair>> {
    let incoming = incoming_refresh_token(&request_headers, &body);
    let pair = state.sessions().refresh(incoming.as_deref()).await?;

    let mut headers = HeaderMap::new();
    set_session_cookies(
        &mut headers,
        &pair.access_token,
        &pair.refresh_token,
        state.secure_cookies(),
    );

    Ok((
        StatusCode::OK,
        headers,
        Json(ApiResponse::success(pair).with_message("Access token refreshed successfully")),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    body: Bytes,
) -> AppResult<Envelope<()>> {
    let incoming = incoming_refresh_token(&request_headers, &body);
    state.sessions().logout(incoming.as_deref()).await?;

    let mut headers = HeaderMap::new();
    clear_session_cookies(&mut headers, state.secure_cookies());

    Ok((
        StatusCode::OK,
        headers,
        Json(ApiResponse::ok("User logged out successfully")),
    ))
}

pub async fn profile(Extension(user): Extension<PublicUser>) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse::success(user).with_message("Current user fetched successfully"))
}
