//! Shared fixtures for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::ws::Message;
use ivm_protocol::{EntityId, Envelope, RoomId};
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::identity::{token_fingerprint, IdentityStore, UserIdentity, UserRecord, UserRole};
use crate::ws::connection::Connection;
use crate::ws::events::EventSink;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::verifier::{Claims, ConnectionVerifier};
use crate::AppState;
use ivm_common::config::{
    AppConfig, AuthConfig, DatabaseConfig, RealtimeConfig, ServerConfig,
};

pub const SECRET: &str = "test-secret";

pub fn role(id: &str) -> UserRole {
    UserRole {
        id: id.to_string(),
        name: id.to_string(),
        permissions: vec!["read".to_string()],
    }
}

/// Random 24-hex id in the shape the system of record issues.
pub fn object_id() -> EntityId {
    EntityId::new(&Uuid::new_v4().simple().to_string()[..24])
}

pub fn identity(role_id: &str) -> UserIdentity {
    let id = object_id();
    UserIdentity {
        id: id.clone(),
        email: format!("{id}@example.com"),
        first_name: "Test".into(),
        last_name: role_id.into(),
        role: role(role_id),
        company_ids: vec![],
    }
}

pub fn connection(identity: UserIdentity) -> (Arc<Connection>, mpsc::UnboundedReceiver<Message>) {
    connection_for(Arc::new(identity))
}

pub fn connection_for(
    identity: Arc<UserIdentity>,
) -> (Arc<Connection>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(identity, tx), rx)
}

/// Drain queued text frames as JSON.
pub fn drain_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(text) = msg {
            out.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    out
}

pub fn mint_token(user_id: &EntityId, token_type: &str, ttl_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        token_type: token_type.to_string(),
        iat: now as usize,
        exp: (now + ttl_secs) as usize,
        jti: Some(Uuid::new_v4().to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://localhost/unused".into(),
            max_connections: 1,
        },
        redis: None,
        auth: AuthConfig {
            jwt_secret: SECRET.into(),
            access_token_type: "access".into(),
        },
        realtime: RealtimeConfig::default(),
    }
}

/// App state over an in-memory store, without Redis.
pub fn state(store: Arc<MemoryStore>) -> Arc<AppState> {
    let config = config();
    let verifier = ConnectionVerifier::new(store, &config.auth, None);
    Arc::new(AppState {
        registry: Arc::new(ConnectionRegistry::new(&config.realtime)),
        config,
        verifier,
        redis: None,
    })
}

/// In-memory identity store.
#[derive(Default)]
pub struct MemoryStore {
    pub sessions: Mutex<HashSet<(String, EntityId)>>,
    pub users: Mutex<HashMap<EntityId, UserRecord>>,
    pub roles: Mutex<HashMap<String, UserRole>>,
    pub companies: Mutex<HashMap<EntityId, Vec<EntityId>>>,
    pub fail: Mutex<bool>,
}

impl MemoryStore {
    /// Insert an active user with a role and a live session; returns the token.
    pub fn add_user(&self, identity: &UserIdentity) -> String {
        let token = mint_token(&identity.id, "access", 3600);
        self.sessions
            .lock()
            .unwrap()
            .insert((token_fingerprint(&token), identity.id.clone()));
        self.users.lock().unwrap().insert(
            identity.id.clone(),
            UserRecord {
                id: identity.id.to_string(),
                email: identity.email.clone(),
                first_name: identity.first_name.clone(),
                last_name: identity.last_name.clone(),
                role_id: identity.role.id.clone(),
                is_active: true,
            },
        );
        self.roles
            .lock()
            .unwrap()
            .insert(identity.role.id.clone(), identity.role.clone());
        self.companies
            .lock()
            .unwrap()
            .insert(identity.id.clone(), identity.company_ids.clone());
        token
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn has_active_session(
        &self,
        token_fingerprint: &str,
        user_id: &EntityId,
    ) -> anyhow::Result<bool> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("store offline");
        }
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .contains(&(token_fingerprint.to_string(), user_id.clone())))
    }

    async fn find_user(&self, user_id: &EntityId) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn find_active_role(&self, role_id: &str) -> anyhow::Result<Option<UserRole>> {
        Ok(self.roles.lock().unwrap().get(role_id).cloned())
    }

    async fn administered_companies(&self, user_id: &EntityId) -> anyhow::Result<Vec<EntityId>> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Delivery recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Room(RoomId, Envelope),
    User(EntityId, Envelope),
    Broadcast(Envelope),
}

impl Sent {
    pub fn envelope(&self) -> &Envelope {
        match self {
            Sent::Room(_, e) | Sent::User(_, e) | Sent::Broadcast(e) => e,
        }
    }
}

/// Sink that records every call instead of writing to sockets.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn rooms(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Room(room, _) => Some(room.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn users(&self) -> Vec<EntityId> {
        self.calls()
            .into_iter()
            .filter_map(|s| match s {
                Sent::User(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn send_to_user(&self, user_id: &EntityId, envelope: &Envelope) -> usize {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::User(user_id.clone(), envelope.clone()));
        1
    }

    fn send_to_room(&self, room: &RoomId, envelope: &Envelope) -> usize {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Room(room.clone(), envelope.clone()));
        1
    }

    fn broadcast(&self, envelope: &Envelope) -> usize {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Broadcast(envelope.clone()));
        1
    }
}
