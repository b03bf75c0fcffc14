use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::state::AppState;

/// The core's exposed surface: one chat turn, session creation, event
/// listing, and an explicit index rebuild.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/events", get(handlers::list_events))
        .route("/api/index/rebuild", post(handlers::rebuild_index))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}
