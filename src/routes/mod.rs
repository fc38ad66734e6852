//! Router assembly: HTTP endpoints, CORS, panic capture, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::error::panic_response;
use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - health endpoints at `/` and `/health`
/// - session endpoints under `/session/{session_id}/{user_id}`
/// - CORS (allow any origin/method/headers)
/// - panics rendered as JSON 500s
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(http::http_root))
        .route("/health", get(http::http_health))
        .route("/session/:session_id/:user_id/message", post(http::http_post_message))
        .route("/session/:session_id/:user_id/complete", post(http::http_post_complete))
        .route("/session/:session_id/:user_id/status", get(http::http_get_status))
        .route("/session/:session_id/:user_id", delete(http::http_delete_session))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
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
}
