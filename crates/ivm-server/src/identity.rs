//! Authenticated identities and the store they are resolved from.
//!
//! The system of record is owned by the REST side of the platform; the
//! gateway only reads sessions, users, roles and company assignments.

use async_trait::async_trait;
use ivm_protocol::{EntityId, Role};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

/// Role record attached to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserRole {
    pub id: String,
    pub name: String,
    pub permissions: Vec<String>,
}

impl UserRole {
    /// The room-bearing role, if the role id is one of them.
    pub fn kind(&self) -> Option<Role> {
        self.id.parse().ok()
    }
}

/// Identity resolved once when a connection is accepted. Immutable for the
/// lifetime of the connection; role changes apply on reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: EntityId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    /// Companies this user administers.
    #[serde(skip)]
    pub company_ids: Vec<EntityId>,
}

impl UserIdentity {
    pub fn role_kind(&self) -> Option<Role> {
        self.role.kind()
    }

    pub fn administers(&self, company_id: &EntityId) -> bool {
        self.company_ids.contains(company_id)
    }
}

/// User row as stored by the platform. Ids are opaque text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role_id: String,
    pub is_active: bool,
}

/// SHA-256 hex digest under which session tokens are stored.
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Read access to the platform's identity data.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether an active, unexpired session exists for this token and user.
    async fn has_active_session(
        &self,
        token_fingerprint: &str,
        user_id: &EntityId,
    ) -> anyhow::Result<bool>;

    async fn find_user(&self, user_id: &EntityId) -> anyhow::Result<Option<UserRecord>>;

    /// Role by id, only if the role is active.
    async fn find_active_role(&self, role_id: &str) -> anyhow::Result<Option<UserRole>>;

    /// Ids of the active companies the user administers.
    async fn administered_companies(&self, user_id: &EntityId) -> anyhow::Result<Vec<EntityId>>;
}

/// PostgreSQL-backed identity store.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    db: PgPool,
}

impl PgIdentityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn has_active_session(
        &self,
        token_fingerprint: &str,
        user_id: &EntityId,
    ) -> anyhow::Result<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            r#"SELECT 1 FROM sessions
               WHERE token_hash = $1
                 AND user_id::text = $2
                 AND is_active = TRUE
                 AND expires_at > NOW()
               LIMIT 1"#,
        )
        .bind(token_fingerprint)
        .bind(user_id.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(found.is_some())
    }

    async fn find_user(&self, user_id: &EntityId) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id::text AS id, email, first_name, last_name, role_id, is_active
               FROM users
               WHERE id::text = $1"#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_active_role(&self, role_id: &str) -> anyhow::Result<Option<UserRole>> {
        let role = sqlx::query_as::<_, UserRole>(
            r#"SELECT id, name, permissions
               FROM roles
               WHERE id = $1 AND is_active = TRUE"#,
        )
        .bind(role_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(role)
    }

    async fn administered_companies(&self, user_id: &EntityId) -> anyhow::Result<Vec<EntityId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"SELECT id::text FROM companies
               WHERE admin_id::text = $1 AND is_active = TRUE
               ORDER BY id"#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(ids.into_iter().map(EntityId::from).collect())
    }
}
