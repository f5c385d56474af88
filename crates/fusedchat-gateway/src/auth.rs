//! Header-based authentication for the protected `/api` routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error};

use crate::error::GatewayError;
use crate::http::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolve `x-user-id` to a [`UserRecord`](crate::users::UserRecord) and
/// store it in the request extensions for the handlers.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Unauthorized("Not authorized, no user ID provided.".into()))?;

    let user = state
        .users
        .find_user(&user_id)
        .await
        .map_err(|e| {
            error!("User lookup for {} failed: {:#}", user_id, e);
            GatewayError::Internal("Server error during authentication.".into())
        })?
        .ok_or_else(|| GatewayError::Unauthorized("Not authorized, user not found.".into()))?;

    debug!("Authenticated {} ({})", user.username, user.id);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
