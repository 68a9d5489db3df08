//! WebSocket upgrade endpoint and per-socket loop.
//!
//! `GET /ws?token=<JWT>` is verified before the upgrade; a refused request
//! never opens a socket. Accepted sockets are registered, greeted with a
//! `connection` frame, and then serve the client control protocol until the
//! peer closes or the heartbeat terminates them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use ivm_protocol::{ClientMessage, RoomId, ServerMessage, INVALID_MESSAGE_FORMAT};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::connection::Connection;
use super::registry::ConnectionRegistry;
use crate::identity::UserIdentity;
use crate::services::redis_services;
use crate::AppState;
use ivm_common::AppError;

/// How long the writer gets to flush queued frames after the reader ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade, authenticated by query parameter.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Some(redis) = &state.redis {
        let rt = &state.config.realtime;
        let rl = redis_services::check_rate_limit(
            &mut redis.clone(),
            &addr.ip().to_string(),
            "ws_upgrade",
            rt.upgrade_rate_limit,
            rt.upgrade_rate_window_secs,
        )
        .await;
        if !rl.allowed {
            tracing::warn!(%addr, limit = rl.limit, "WebSocket upgrade rate limited");
            return AppError::TooManyRequests("Too many connection attempts".into())
                .into_response();
        }
    }

    match state.verifier.verify(params.token.as_deref()).await {
        Ok(identity) => {
            tracing::info!(
                user_id = %identity.id,
                role = %identity.role.id,
                %addr,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
        }
        Err(err) => {
            tracing::warn!(%addr, reason = %err, "WebSocket connection refused");
            AppError::from(err).into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: UserIdentity) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create an mpsc channel so any task can queue frames for this socket
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Forward channel → WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let conn = Connection::new(Arc::new(identity), tx);
    state.registry.register(conn.clone());
    conn.send_frame(&ServerMessage::connection());

    loop {
        tokio::select! {
            _ = conn.terminated() => {
                tracing::info!(user_id = %conn.user_id(), conn_id = %conn.id(), "WebSocket terminated by server");
                break;
            }
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(msg) => {
                        conn.mark_alive();
                        match msg {
                            Message::Text(text) => {
                                handle_client_message(&state.registry, &conn, text.as_str());
                            }
                            Message::Binary(data) => match std::str::from_utf8(&data) {
                                Ok(text) => handle_client_message(&state.registry, &conn, text),
                                Err(_) => {
                                    conn.send_frame(&ServerMessage::error(INVALID_MESSAGE_FORMAT));
                                }
                            },
                            Message::Ping(data) => {
                                conn.send(Message::Pong(data));
                            }
                            Message::Pong(_) => {}
                            Message::Close(_) => {
                                tracing::info!(user_id = %conn.user_id(), "WebSocket closed by client");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(user_id = %conn.user_id(), "WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // ── Cleanup ──────────────────────────────────────────────
    state.registry.unregister(&conn);
    drop(conn);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
}

/// Handle one client frame. Replies go to the sending socket only.
pub fn handle_client_message(registry: &ConnectionRegistry, conn: &Connection, text: &str) {
    let user_id = conn.user_id();
    let msg = match ClientMessage::parse(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(%user_id, "Malformed client message: {}", e);
            conn.send_frame(&ServerMessage::error(INVALID_MESSAGE_FORMAT));
            return;
        }
    };

    match msg {
        ClientMessage::Ping => {
            conn.send_frame(&ServerMessage::pong());
        }
        ClientMessage::JoinRoom { room_id } => {
            let room = RoomId::from(room_id);
            if registry.may_join(conn.identity(), &room) {
                registry.rooms().join(user_id, room.clone());
                conn.send_frame(&ServerMessage::room_joined(room.as_str()));
            } else {
                tracing::warn!(%user_id, %room, "Room join denied");
                conn.send_frame(&ServerMessage::error(format!("Not allowed to join room {room}")));
            }
        }
        ClientMessage::LeaveRoom { room_id } => {
            let room = RoomId::from(room_id);
            registry.rooms().leave(user_id, &room);
            conn.send_frame(&ServerMessage::room_left(room.as_str()));
        }
        ClientMessage::Subscribe { channels } => {
            let (accepted, denied): (Vec<String>, Vec<String>) = channels
                .into_iter()
                .partition(|c| registry.may_join(conn.identity(), &RoomId::new(c.as_str())));
            for channel in &accepted {
                registry.rooms().join(user_id, RoomId::new(channel.as_str()));
            }
            if !denied.is_empty() {
                tracing::warn!(%user_id, ?denied, "Subscription denied for channels");
            }
            conn.send_frame(&ServerMessage::subscribed(accepted));
        }
        ClientMessage::Unsubscribe { channels } => {
            for channel in &channels {
                registry.rooms().leave(user_id, &RoomId::new(channel.as_str()));
            }
            conn.send_frame(&ServerMessage::unsubscribed(channels));
        }
        ClientMessage::Unknown(kind) => {
            tracing::warn!(%user_id, kind = %kind, "Unknown client message type");
        }
    }
}
