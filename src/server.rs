use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Builds the demo `Router`: a simulated upstream API for the traffic
/// generator to call, plus a counter that the emitter posts records to.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Simulated upstream API ──────────────────────────────
        .route("/api/users", get(handlers::upstream::list_users))
        .route("/api/users/:id", get(handlers::upstream::get_user))
        .route(
            "/api/products/:id",
            get(handlers::upstream::get_product),
        )
        .route("/api/flaky", get(handlers::upstream::flaky))
        .route("/other/path", get(handlers::upstream::other_path))
        // ── Demo record counter ─────────────────────────────────
        .route("/api/calls", post(handlers::calls::receive_call))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
