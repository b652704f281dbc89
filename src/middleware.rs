//! Access guard for role-gated routes.
//!
//! Order matters: a missing or unverifiable token is rejected before
//! any role is looked at, and a role mismatch is a forbidden outcome,
//! never a success-shaped payload.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::{CurrentUser, Role};

const BEARER: &str = "Bearer ";

/// Resolve and authorize the caller, then attach its identity.
async fn authorize(
    state: &AppState,
    target: Role,
    req: &mut Request,
) -> Result<()> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .ok_or(ServerError::Unauthorized)?;

    let claims = state
        .token
        .decode(token)
        .map_err(|_| ServerError::Unauthorized)?;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| ServerError::Unauthorized)?;

    // A valid token for a vanished account stays unauthenticated.
    let profile = match state.users.get_user_by_id(user_id).await {
        Ok(profile) => profile,
        Err(ServerError::NotFound) => return Err(ServerError::Unauthorized),
        Err(err) => return Err(err),
    };

    if !profile.role.authorizes(target) {
        return Err(ServerError::AccessDenied);
    }

    req.extensions_mut().insert(CurrentUser {
        id: profile.id,
        login: profile.login,
        role: profile.role,
    });

    Ok(())
}

/// Guard for USER-gated routes.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    authorize(&state, Role::User, &mut req).await?;
    Ok(next.run(req).await)
}

/// Guard for ADMIN-gated routes.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    authorize(&state, Role::Admin, &mut req).await?;
    Ok(next.run(req).await)
}
