//! # Chat Server
//!
//! Development backend speaking the chat protocol: a WebSocket endpoint
//! backed by an [`agent::Agent`] and a health check.

pub mod agent;
pub mod api;
pub mod config;
pub mod handlers;
pub mod state;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::health))
        .route("/health", get(api::health))
        .route("/ws", get(handlers::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
