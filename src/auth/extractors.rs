use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState, users::repo::Identity};

/// Raw bearer credential from the `Authorization` header, unverified.
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Invalid authentication scheme".into()))?;

        Ok(BearerToken(token.to_string()))
    }
}

/// The caller, resolved from a valid access token. Served from the identity
/// cache when possible, otherwise loaded from the user store and cached until
/// the token expires.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        if let Some(identity) = state.identity_cache.get(&token).await {
            debug!(user_id = %identity.id, "identity cache hit");
            return Ok(AuthUser(identity));
        }

        let claims = state.keys.verify_access(&token)?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for unknown user");
                ApiError::Unauthorized("Could not validate credentials".into())
            })?;

        let identity = Identity::from(&user);
        if let Ok(expires_at) = OffsetDateTime::from_unix_timestamp(claims.exp as i64) {
            state
                .identity_cache
                .insert(&token, identity.clone(), expires_at)
                .await;
        }
        Ok(AuthUser(identity))
    }
}
