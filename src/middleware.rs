//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{NO_TOKEN, NOT_ADMIN, Result, ServerError, TOKEN_FAILED};
use crate::user::{User, UserId};

const BEARER: &str = "Bearer ";

/// Resolve the bearer token into the acting [`User`].
///
/// The user is inserted as a request extension.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .ok_or(ServerError::Unauthorized(NO_TOKEN))?;

    let claims = state.token.decode(token).map_err(|err| {
        tracing::debug!(error = %err, "bearer token rejected");
        ServerError::Unauthorized(TOKEN_FAILED)
    })?;
    let user_id = claims
        .sub
        .parse::<UserId>()
        .map_err(|_| ServerError::Unauthorized(TOKEN_FAILED))?;

    let user = state
        .users
        .find(&user_id)
        .await?
        .ok_or(ServerError::Unauthorized(TOKEN_FAILED))?;

    req.extensions_mut().insert::<User>(user);
    Ok(next.run(req).await)
}

/// Restrict catalog writes to administrators.
///
/// Must run after [`auth`].
pub async fn admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    if state.config.catalog.admin_only_writes {
        let is_admin = req
            .extensions()
            .get::<User>()
            .is_some_and(|user| user.is_admin);

        if !is_admin {
            return Err(ServerError::Unauthorized(NOT_ADMIN));
        }
    }

    Ok(next.run(req).await)
}
