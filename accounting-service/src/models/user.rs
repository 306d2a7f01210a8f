use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::policy::Role;

/// Authenticated caller, placed in request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not authenticated")))?;

        tracing::Span::current().record("user_id", tracing::field::display(user.user_id));

        Ok(user)
    }
}
