use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Signaling
        .route("/ws", get(handlers::signaling_socket))
        // Session queries
        .route(
            "/sessions/:session_id/status",
            get(handlers::get_session_status),
        )
        // Post-processing
        .route("/recordings/combine", post(handlers::combine_recordings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
