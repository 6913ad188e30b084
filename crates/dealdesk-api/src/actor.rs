//! Request actor extraction.
//!
//! The caller's identity arrives in the `X-User-Id` header. Session
//! handling lives in front of this service; here the header is trusted.
//!
//! ```rust,ignore
//! pub async fn my_deals(State(state): State<AppState>, Actor(user): Actor) -> ApiResult<...> {
//!     // ...
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use dealdesk_types::UserId;

use crate::AppState;
use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

/// A caller listed in `ADMIN_USER_IDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admin(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".into()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("invalid X-User-Id header".into()))?;

        UserId::parse(raw)
            .map(Actor)
            .ok_or_else(|| ApiError::Unauthorized("X-User-Id must be a UUID".into()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Actor(user) = Actor::from_request_parts(parts, state).await?;
        if !state.config.is_admin(user) {
            tracing::warn!(user = %user, "admin route refused");
            return Err(ApiError::Forbidden("admin only".into()));
        }
        Ok(Admin(user))
    }
}
