//! In-memory registry for live WebSocket connections.
//!
//! Maps each user to their open sockets (one per tab/device) and owns the
//! room registry. This is the only place sockets are looked up for outbound
//! delivery. Scope is this process; there is no cross-instance routing.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ivm_common::config::RealtimeConfig;
use ivm_protocol::{EntityId, Envelope, RoomId};

use super::connection::Connection;
use super::events::EventSink;
use super::rooms::{self, RoomRegistry};
use crate::identity::UserIdentity;

/// Central registry shared across all WebSocket handler tasks.
#[derive(Debug)]
pub struct ConnectionRegistry {
    /// user_id → open connections. A key exists only while its list is non-empty.
    clients: DashMap<EntityId, Vec<Arc<Connection>>>,
    rooms: RoomRegistry,
    auto_join_company_rooms: bool,
    restrict_room_joins: bool,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(&RealtimeConfig::default())
    }
}

impl ConnectionRegistry {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            clients: DashMap::new(),
            rooms: RoomRegistry::new(),
            auto_join_company_rooms: config.auto_join_company_rooms,
            restrict_room_joins: config.restrict_room_joins,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    // ─── Connection lifecycle ────────────────────────────────

    /// Register a newly accepted connection and join its user to the
    /// role-derived rooms.
    pub fn register(&self, conn: Arc<Connection>) {
        let user_id = conn.user_id().clone();
        // The entry guard serializes this against `unregister` for the same
        // user, so a racing last-close cannot strip the rooms joined here.
        let mut entry = self.clients.entry(user_id.clone()).or_default();
        entry.push(conn.clone());
        let connections = entry.len();
        let joined = self.join_user_to_rooms(conn.identity());
        drop(entry);

        tracing::info!(
            %user_id,
            conn_id = %conn.id(),
            connections,
            rooms = ?joined,
            "Connection registered"
        );
    }

    /// Apply the fixed role-to-room policy. Returns the rooms joined.
    pub fn join_user_to_rooms(&self, identity: &UserIdentity) -> Vec<RoomId> {
        let rooms = rooms::default_rooms(identity, self.auto_join_company_rooms);
        for room in &rooms {
            self.rooms.join(&identity.id, room.clone());
        }
        rooms
    }

    /// Whether a client-requested join of `room` is allowed. Every room is
    /// open unless `restrict_room_joins` is set.
    pub fn may_join(&self, identity: &UserIdentity, room: &RoomId) -> bool {
        !self.restrict_room_joins || rooms::may_join(identity, room)
    }

    /// Remove a connection. When it was the user's last one, the user key is
    /// deleted and the user leaves every room. Safe to call more than once;
    /// returns `true` only for the call that removed the last connection.
    pub fn unregister(&self, conn: &Connection) -> bool {
        let user_id = conn.user_id().clone();
        let Entry::Occupied(mut occ) = self.clients.entry(user_id.clone()) else {
            return false;
        };

        let before = occ.get().len();
        occ.get_mut().retain(|c| c.id() != conn.id());
        if occ.get().len() == before {
            return false;
        }

        if occ.get().is_empty() {
            occ.remove();
            let left = self.rooms.leave_all(&user_id);
            tracing::info!(%user_id, conn_id = %conn.id(), rooms_left = left, "Last connection closed");
            true
        } else {
            tracing::info!(
                %user_id,
                conn_id = %conn.id(),
                remaining = occ.get().len(),
                "Connection unregistered"
            );
            false
        }
    }

    // ─── Delivery ────────────────────────────────────────────

    fn serialize(envelope: &Envelope) -> Option<Message> {
        match envelope.to_json() {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                tracing::error!(kind = %envelope.kind, "Failed to serialize envelope: {}", e);
                None
            }
        }
    }

    /// Queue an already-serialized frame on every open socket of a user.
    fn deliver(&self, user_id: &EntityId, msg: &Message) -> usize {
        match self.clients.get(user_id) {
            Some(conns) => conns.iter().filter(|c| c.send(msg.clone())).count(),
            None => 0,
        }
    }

    // ─── Stats ───────────────────────────────────────────────

    pub fn connected_user_count(&self) -> usize {
        self.clients.len()
    }

    pub fn connection_count(&self) -> usize {
        self.clients.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_user_online(&self, user_id: &EntityId) -> bool {
        self.clients.contains_key(user_id)
    }

    pub fn user_connection_count(&self, user_id: &EntityId) -> usize {
        self.clients.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    pub fn room_sizes(&self) -> BTreeMap<String, usize> {
        self.rooms.room_sizes()
    }

    /// Snapshot of every registered connection.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.clients
            .iter()
            .flat_map(|e| e.value().clone())
            .collect()
    }

    // ─── Shutdown ────────────────────────────────────────────

    /// Close every socket with "going away". Each socket task unregisters
    /// itself as it exits.
    pub fn close_all(&self) -> usize {
        let conns = self.connections();
        for conn in &conns {
            conn.close(Some(CloseFrame {
                code: 1001,
                reason: "Server shutting down".into(),
            }));
        }
        tracing::info!(count = conns.len(), "Closed all WebSocket connections");
        conns.len()
    }
}

impl EventSink for ConnectionRegistry {
    /// Best effort: a user without open sockets is a silent no-op.
    fn send_to_user(&self, user_id: &EntityId, envelope: &Envelope) -> usize {
        match Self::serialize(envelope) {
            Some(msg) => self.deliver(user_id, &msg),
            None => 0,
        }
    }

    fn send_to_room(&self, room: &RoomId, envelope: &Envelope) -> usize {
        let members = self.rooms.members(room);
        if members.is_empty() {
            tracing::debug!(%room, kind = %envelope.kind, "Room has no members");
            return 0;
        }
        let Some(msg) = Self::serialize(envelope) else {
            return 0;
        };
        members.iter().map(|user_id| self.deliver(user_id, &msg)).sum()
    }

    fn broadcast(&self, envelope: &Envelope) -> usize {
        let Some(msg) = Self::serialize(envelope) else {
            return 0;
        };
        self.clients
            .iter()
            .map(|e| e.value().iter().filter(|c| c.send(msg.clone())).count())
            .sum()
    }
}
