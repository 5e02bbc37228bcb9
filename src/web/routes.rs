use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::root_info))
        .nest(
            "/api",
            Router::new()
                // Query endpoints
                .route("/generate-sql", post(handlers::api::generate_sql))
                .route("/execute-sql", post(handlers::api::execute_sql))
                // History
                .route("/sessions", get(handlers::api::list_sessions))
                .route("/sessions/{session_id}", get(handlers::api::get_session)),
        )
}
