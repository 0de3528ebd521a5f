//! HTTP router.

use std::sync::Arc;

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::flows::TokenManager;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub manager: TokenManager,
}

/// Create the HTTP router.
pub fn create_router(manager: TokenManager) -> Router {
    let state = Arc::new(HttpState { manager });

    Router::new()
        .route("/health", get(health_check))
        // Provider redirect target
        .route(
            "/api/method/connected_app.callback",
            get(handlers::handle_callback).fallback(handlers::handle_invalid_method),
        )
        .route(
            "/api/method/connected_app.callback/",
            get(handlers::handle_callback).fallback(handlers::handle_invalid_method),
        )
        .route(
            "/api/method/connected_app.callback/{*app}",
            get(handlers::handle_callback).fallback(handlers::handle_invalid_method),
        )
        // Tokens
        .route("/api/connected-apps/{app}/token", get(handlers::handle_user_token))
        .route("/api/connected-apps/{app}/client-token", get(handlers::handle_client_token))
        // Administration
        .route(
            "/api/connected-apps",
            get(handlers::handle_list_apps).post(handlers::handle_save_app),
        )
        .route("/api/connected-apps/{app}", get(handlers::handle_get_app))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "connected-apps",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
