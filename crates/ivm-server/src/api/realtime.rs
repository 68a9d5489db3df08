//! Real-time gateway API: live stats and server-side event injection.
//!
//! `POST /realtime/events` is the same entry point business code uses
//! in-process (`AppState::events().dispatch_raw`), exposed for services
//! that run outside this process.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ivm_protocol::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::middleware::AuthUser;
use crate::ws::events::EventOptions;
use crate::AppState;
use ivm_common::{AppError, AppResult};

static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn server_start() -> Instant {
    *SERVER_START.get_or_init(Instant::now)
}

pub fn router(state: Arc<AppState>) -> Router {
    let _ = server_start();
    Router::new()
        .route("/stats", get(get_stats))
        .route("/events", post(publish_event))
        .with_state(state)
}

// ─── Stats ───────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    connected_users: usize,
    connections: usize,
    rooms: BTreeMap<String, usize>,
    uptime_secs: u64,
}

async fn get_stats(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<StatsResponse>> {
    auth.require_role(&[Role::Admin, Role::SuperAdmin])?;

    Ok(Json(StatsResponse {
        connected_users: state.registry.connected_user_count(),
        connections: state.registry.connection_count(),
        rooms: state.registry.room_sizes(),
        uptime_secs: server_start().elapsed().as_secs(),
    }))
}

// ─── Event injection ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PublishRequest {
    event: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    options: EventOptions,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    event: String,
    delivered: usize,
}

async fn publish_event(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PublishRequest>,
) -> AppResult<(StatusCode, Json<PublishResponse>)> {
    auth.require_role(&[Role::SuperAdmin])?;

    let delivered = state
        .events()
        .dispatch_raw(&req.event, req.data, &req.options)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tracing::info!(
        user_id = %auth.user_id(),
        event = %req.event,
        delivered,
        "Event published via API"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            event: req.event,
            delivered,
        }),
    ))
}
