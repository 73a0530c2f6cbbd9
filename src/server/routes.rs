//! Route definitions for the API server

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Creates the main application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Dataset information
        .route("/symbols", get(handlers::list_symbols))
        // Session management
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        // Selection events
        .route(
            "/sessions/:session_id/toggle/:symbol",
            post(handlers::toggle_symbol),
        )
        .route("/sessions/:session_id/range", put(handlers::set_date_range))
        .route("/sessions/:session_id/select-all", post(handlers::select_all))
        .route("/sessions/:session_id/clear", post(handlers::clear_selection))
        // Rendered outputs
        .route("/sessions/:session_id/summary", get(handlers::get_summary))
        .route("/sessions/:session_id/price", get(handlers::get_price_evolution))
        .route("/sessions/:session_id/volatility", get(handlers::get_volatility))
        .route("/sessions/:session_id/scatter", get(handlers::get_scatter))
        .route("/sessions/:session_id/table", get(handlers::get_table))
        // SSE streaming
        .route("/sessions/:session_id/stream", get(handlers::handle_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
