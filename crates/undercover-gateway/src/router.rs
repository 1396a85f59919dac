//! Axum router wiring.
//!
//! - `POST /api/v1/rooms/create` : open a room
//! - `GET  /api/v1/ws/join`      : WebSocket upgrade + join handshake
//! - ops endpoints

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/rooms/create", post(transport::http::create_room))
        .route("/api/v1/ws/join", get(transport::ws::ws_join))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
