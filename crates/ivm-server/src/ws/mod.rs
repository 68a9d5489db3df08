//! WebSocket gateway for real-time platform updates.

pub mod connection;
pub mod events;
pub mod handler;
pub mod registry;
pub mod rooms;
pub mod verifier;

use crate::AppState;
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", axum::routing::get(handler::ws_upgrade))
        .with_state(state)
}
