use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::{self, Identity};
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the session token
pub const AUTH_HEADER: &str = "x-auth-token";

/// Authenticated user context extracted from the session token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl From<Identity> for AuthUser {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
        }
    }
}

/// Token middleware for the protected router. Runs before any body
/// extraction, so an unauthenticated request never reaches input parsing.
pub async fn token_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())?;
    let identity = auth::verify(&token, state.secret())?;

    if state.config.security.verify_user_exists && state.users().select_id(&identity.user_id).await?.is_none() {
        debug!("Token user {} no longer exists", identity.user_id);
        return Err(ApiError::InvalidToken);
    }

    request.extensions_mut().insert(AuthUser::from(identity));
    Ok(next.run(request).await)
}

fn extract_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers.get(AUTH_HEADER).ok_or(ApiError::NoToken)?;
    let token = value.to_str().map_err(|_| ApiError::InvalidToken)?.trim();
    if token.is_empty() {
        return Err(ApiError::NoToken);
    }
    Ok(token.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or(ApiError::NoToken)
    }
}
