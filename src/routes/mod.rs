//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (request/reply plus pushed state after deferred transitions)
/// - Puzzle API under `/api/v1/...`
/// - Static front-end from `./static` with index fallback
/// - Permissive CORS and per-request trace spans
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/state", get(http::http_get_state))
        .route("/api/v1/puzzles", get(http::http_list_puzzles))
        .route("/api/v1/puzzle/load", post(http::http_load_puzzle))
        .route("/api/v1/puzzle/next", post(http::http_next_puzzle))
        .route("/api/v1/puzzle/place", post(http::http_place_block))
        .route("/api/v1/puzzle/clear", post(http::http_clear_slot))
        .route("/api/v1/puzzle/submit", post(http::http_submit))
        .route("/api/v1/puzzle/reset", post(http::http_reset_section))
        .route("/api/v1/puzzle/retry", post(http::http_retry))
        .route("/api/v1/puzzle/skip", post(http::http_skip))
        .route("/api/v1/progress/reset", post(http::http_reset_progress))
        .route("/api/v1/developer", post(http::http_update_developer))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
