use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use coursemart_core::api_types::ApiResponse;

use crate::{AppState, users::auth};

pub mod paths {
    pub const HEALTH: &str = "/api/v1/health";
    pub const REGISTER: &str = "/api/v1/users/register";
    pub const LOGIN: &str = "/api/v1/users/login";
    pub const REFRESH_TOKEN: &str = "/api/v1/users/refresh-token";
    pub const LOGOUT: &str = "/api/v1/users/logout";
    pub const PROFILE: &str = "/api/v1/users/profile";
}

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/users", user_routes(state))
}

fn user_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/profile", get(auth::handlers::profile))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ));

    Router::new()
        .route("/register", post(auth::handlers::register))
        .route("/login", post(auth::handlers::login))
        .route("/refresh-token", post(auth::handlers::refresh_token))
        .route("/logout", post(auth::handlers::logout))
        .merge(protected)
}

async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::ok("Server is running"))
}
