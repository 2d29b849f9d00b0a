//! # REST API Endpoints
//!
//! Provides HTTP endpoints next to the WebSocket. Currently only a health
//! check describing the service.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Endpoints {
    pub websocket: &'static str,
    pub health: &'static str,
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,

    /// Number of currently connected clients.
    pub active_sessions: usize,
    pub endpoints: Endpoints,
}

/// `GET /health`: Reports that the server is up.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        active_sessions: state.sessions.len(),
        endpoints: Endpoints {
            websocket: "/ws",
            health: "/health",
        },
    })
}
