use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{AuthError, AuthUser};
use crate::db::models::AppRole;
use crate::response::AppError;
use crate::state::AppState;

pub const MISSING_HEADER_MESSAGE: &str = "No authorization header";
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Resolves the bearer token on `headers` to a user.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    if !crate::auth::has_authorization_header(headers) {
        return Err(AppError::unauthorized(MISSING_HEADER_MESSAGE));
    }

    let token = crate::auth::extract_token(headers)
        .ok_or_else(|| AppError::unauthorized(UNAUTHORIZED_MESSAGE))?;

    crate::auth::verify_token(&token, state.jwt_secret()).map_err(|err| {
        match err {
            AuthError::MissingSecret => {
                tracing::error!("JWT_SECRET is not configured; rejecting bearer token")
            }
            other => tracing::debug!(error = %other, "bearer token rejected"),
        }
        AppError::unauthorized(UNAUTHORIZED_MESSAGE)
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

/// Fails with 403 unless the user's role is one of `allowed`.
pub async fn require_role(
    state: &AppState,
    user: &AuthUser,
    allowed: &[AppRole],
) -> Result<AppRole, AppError> {
    let role = state.store().find_role(&user.id).await?;
    match role {
        Some(role) if allowed.contains(&role) => Ok(role),
        _ => Err(AppError::forbidden("Insufficient permissions")),
    }
}
