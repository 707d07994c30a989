use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::cookies::{self, ACCESS_COOKIE};
use super::dto::{JwtKeys, TokenKind};
use crate::error::ApiError;

/// Verified session owner. Tries the access-token cookie, then `Authorization: Bearer`;
/// the first token that verifies wins.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        // A stale cookie must not shadow a valid bearer header.
        let candidates = [
            cookies::read(&parts.headers, ACCESS_COOKIE),
            bearer_token(&parts.headers),
        ];
        let mut presented = false;
        for token in candidates.into_iter().flatten() {
            presented = true;
            match keys.verify(token, TokenKind::Access) {
                Ok(claims) => return Ok(AuthUser(claims.sub)),
                Err(e) => warn!(error = %e, "rejected access token"),
            }
        }

        if presented {
            Err(ApiError::unauthorized("Invalid or expired token"))
        } else {
            Err(ApiError::unauthorized("Not authenticated"))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
}
