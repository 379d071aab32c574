//! # Coursemart Server
//!
//! Thin axum adapter over [`coursemart_core::SessionManager`]. Handlers pull
//! tokens out of cookies, headers, and JSON bodies, call the session manager,
//! and hand tokens back as `HttpOnly` cookies plus the JSON envelope.

pub mod infra;
pub mod routes;
pub mod users;

use axum::{Router, http::Uri};
use tower_http::trace::TraceLayer;

pub use infra::app_state::AppState;
use infra::errors::AppError;

pub fn create_app(state: AppState) -> Router {
    routes::create_api_router(state.clone())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Route {} not found", uri.path()))
}
