//! Bearer authentication: Axum `FromRequestParts` extractor.
//!
//! Extracts the token from the `Authorization: Bearer <token>` header and runs
//! it through the same verifier that guards WebSocket upgrades, so a REST
//! caller must hold a live session exactly like a socket client.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ivm_protocol::{EntityId, Role};

use crate::identity::UserIdentity;
use crate::AppState;
use ivm_common::AppError;

/// Authenticated user extractor.
///
/// Use as a handler parameter to require authentication:
/// ```ignore
/// async fn protected(user: AuthUser) -> impl IntoResponse { ... }
/// ```
pub struct AuthUser(pub UserIdentity);

impl AuthUser {
    pub fn user_id(&self) -> &EntityId {
        &self.0.id
    }

    /// Reject callers whose role is not in `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        match self.0.role_kind() {
            Some(role) if allowed.contains(&role) => Ok(()),
            _ => Err(AppError::Forbidden("Insufficient role".into())),
        }
    }
}

impl FromRequestParts<std::sync::Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &std::sync::Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

        // Strip "Bearer " prefix
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".into()))?;

        let identity = state.verifier.verify(Some(token)).await.map_err(|e| {
            tracing::debug!("Bearer verification failed: {}", e);
            AppError::from(e)
        })?;

        Ok(AuthUser(identity))
    }
}
