// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router.
use crate::error::AppError;
use crate::handlers::{admin, auth, health, me};
use crate::middleware::request_gate;
use crate::AppState;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the application router. Every route, the fallback included, passes the gate.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(me::me))
        .route("/api/admin/sessions", get(admin::list_sessions))
        .route("/api/admin/sessions/{id}", delete(admin::terminate_session))
        .route(
            "/api/admin/users/{id}/sessions",
            delete(admin::terminate_user_sessions),
        )
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), request_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> AppError {
    AppError::NotFound("route".to_string())
}
