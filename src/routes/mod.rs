//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries both websocket channels, a health check, and the
//! prebuilt single-page app. Any path that is not a route or an existing
//! asset falls back to the app's `index.html` so client-side routing works.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::compression::Compression;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir.clone();
    let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/ws/chat", get(ws::handle_chat_ws))
        .route("/ws/update", get(ws::handle_update_ws))
        .route("/healthz", get(healthz))
        .fallback_service(Compression::new(spa))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
