//! # IVM Server
//!
//! Real-time fan-out gateway for the investment platform: authenticated
//! WebSocket connections, role and company rooms, heartbeat liveness, and
//! typed domain events routed to the right audiences.

pub mod api;
pub mod identity;
pub mod services;
pub mod workers;
pub mod ws;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ws::events::EventDispatcher;
use ws::registry::ConnectionRegistry;
use ws::verifier::ConnectionVerifier;

/// Shared application state available to all handlers.
pub struct AppState {
    pub config: ivm_common::AppConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub verifier: ConnectionVerifier,
    /// Used for upgrade rate limiting; the gateway runs without it.
    pub redis: Option<redis::aio::ConnectionManager>,
}

impl AppState {
    /// Typed event entry point for business code.
    pub fn events(&self) -> EventDispatcher<'_> {
        EventDispatcher::new(self.registry.as_ref())
    }
}

/// Build the HTTP + WebSocket router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api::router(state.clone()))
        .merge(ws::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
