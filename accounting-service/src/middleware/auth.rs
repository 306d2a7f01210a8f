use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::AuthUser;
use crate::services::Section;
use crate::startup::AppState;

/// Middleware to require a valid bearer token from the auth provider.
///
/// The resolved [`AuthUser`] is stored in request extensions for handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let user = state.auth.authenticate(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        e
    })?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Gate a group of routes on the caller's role. Runs after [`auth_middleware`].
pub async fn require_section(
    State(section): State<Section>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not authenticated")))?;

    if !user.role.can_access(section) {
        tracing::warn!(
            user_id = %user.user_id,
            role = user.role.as_str(),
            section = ?section,
            "Access denied"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Your role does not have access to this section"
        )));
    }

    Ok(next.run(req).await)
}
