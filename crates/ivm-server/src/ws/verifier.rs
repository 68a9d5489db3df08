//! Connection verifier: decides whether an upgrade request may open a socket.
//!
//! Token → JWT signature/expiry → token type → revocation (Redis, optional)
//! → active session → active user → active role. Every failure refuses the
//! upgrade; nothing is registered until verification has succeeded.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};
use ivm_protocol::EntityId;
use serde::{Deserialize, Serialize};

use crate::identity::{token_fingerprint, IdentityStore, UserIdentity};
use crate::services::redis_services;
use ivm_common::config::AuthConfig;
use ivm_common::AppError;

/// Claims carried by platform-issued tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("no token supplied")]
    MissingToken,
    #[error("token expired")]
    Expired,
    #[error("token invalid: {0}")]
    InvalidToken(String),
    #[error("wrong token type `{0}`")]
    WrongTokenType(String),
    #[error("token revoked")]
    Revoked,
    #[error("no active session for token")]
    NoActiveSession,
    #[error("user not found")]
    UserNotFound,
    #[error("user inactive")]
    UserInactive,
    #[error("role `{0}` not found or inactive")]
    RoleNotFound(String),
    #[error("identity store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Store(e) => AppError::Internal(e),
            _ => AppError::Unauthorized("Authentication failed".into()),
        }
    }
}

/// Resolves bearer tokens into identities.
#[derive(Clone)]
pub struct ConnectionVerifier {
    store: Arc<dyn IdentityStore>,
    decoding_key: DecodingKey,
    access_token_type: String,
    revocations: Option<redis::aio::ConnectionManager>,
}

impl ConnectionVerifier {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        auth: &AuthConfig,
        revocations: Option<redis::aio::ConnectionManager>,
    ) -> Self {
        Self {
            store,
            decoding_key: DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
            access_token_type: auth.access_token_type.clone(),
            revocations,
        }
    }

    /// Verify a token and load the identity attached to the connection.
    pub async fn verify(&self, token: Option<&str>) -> Result<UserIdentity, VerifyError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(VerifyError::MissingToken)?;

        let claims = self.decode(token)?;
        if claims.sub.trim().is_empty() {
            return Err(VerifyError::InvalidToken("token has no subject".into()));
        }
        let user_id = EntityId::from(claims.sub);

        if let (Some(redis), Some(jti)) = (&self.revocations, claims.jti.as_deref()) {
            if redis_services::is_token_blacklisted(&mut redis.clone(), jti).await {
                return Err(VerifyError::Revoked);
            }
        }

        if !self
            .store
            .has_active_session(&token_fingerprint(token), &user_id)
            .await?
        {
            return Err(VerifyError::NoActiveSession);
        }

        let user = self
            .store
            .find_user(&user_id)
            .await?
            .ok_or(VerifyError::UserNotFound)?;
        if !user.is_active {
            return Err(VerifyError::UserInactive);
        }

        let role = self
            .store
            .find_active_role(&user.role_id)
            .await?
            .ok_or_else(|| VerifyError::RoleNotFound(user.role_id.clone()))?;

        let company_ids = self.store.administered_companies(&user_id).await?;

        Ok(UserIdentity {
            id: user_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role,
            company_ids,
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, VerifyError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::InvalidToken(e.to_string()),
            },
        )?;

        if data.claims.token_type != self.access_token_type {
            return Err(VerifyError::WrongTokenType(data.claims.token_type));
        }
        Ok(data.claims)
    }
}
