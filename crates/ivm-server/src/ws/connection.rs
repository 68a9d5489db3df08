//! A single live socket and its liveness bookkeeping.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message};
use chrono::{DateTime, TimeZone, Utc};
use ivm_protocol::{EntityId, ServerMessage};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::identity::UserIdentity;

/// Channel sender capable of pushing WS frames to a connected peer.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Handle to one open socket. Owned by the registry entry of its user; the
/// socket task holds the other reference and drains `tx` into the transport.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    identity: Arc<UserIdentity>,
    tx: WsSender,
    /// Cleared by each heartbeat sweep, set again by any inbound frame.
    alive: AtomicBool,
    open: AtomicBool,
    last_activity_ms: AtomicI64,
    connected_at: DateTime<Utc>,
    shutdown: Notify,
}

impl Connection {
    pub fn new(identity: Arc<UserIdentity>, tx: WsSender) -> Arc<Self> {
        let now = Utc::now();
        Arc::new(Self {
            id: Uuid::new_v4(),
            identity,
            tx,
            alive: AtomicBool::new(true),
            open: AtomicBool::new(true),
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            connected_at: now,
            shutdown: Notify::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &EntityId {
        &self.identity.id
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_activity_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or(self.connected_at)
    }

    /// Open until terminated or until the socket task has gone away.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Queue a frame. Returns `false` (and drops the frame) if the socket is
    /// not open.
    pub fn send(&self, msg: Message) -> bool {
        if !self.is_open() {
            return false;
        }
        self.tx.send(msg).is_ok()
    }

    pub fn send_frame(&self, frame: &ServerMessage) -> bool {
        match frame.to_json() {
            Ok(text) => self.send(Message::Text(text.into())),
            Err(e) => {
                tracing::error!("Failed to serialize control frame: {}", e);
                false
            }
        }
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Record proof of life (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
        self.touch();
    }

    /// Clear the liveness flag, returning whether it was set.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    pub fn ping(&self) -> bool {
        self.send(Message::Ping(Bytes::new()))
    }

    /// Close the socket without a close reason.
    pub fn terminate(&self) {
        self.close(None);
    }

    /// Queue a close frame and wake the socket task. Idempotent.
    pub fn close(&self, frame: Option<CloseFrame>) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Message::Close(frame));
            self.shutdown.notify_one();
        }
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn terminated(&self) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        self.shutdown.notified().await;
    }
}
