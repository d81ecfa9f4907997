//! Access token extractors
//!
//! Handlers take [`AuthUser`] or [`AdminUser`] as a parameter; the request is
//! rejected with 401/403 before the handler body runs.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use kernel::id::{GameSessionId, UserId};

use crate::domain::repository::RewardsStore;
use crate::domain::value_objects::UserRole;
use crate::error::RewardsError;
use crate::presentation::handlers::RewardsAppState;

/// Caller identified by a valid `Authorization: Bearer` access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: UserRole,
    /// Set for tokens obtained through the webview launch exchange
    pub session_id: Option<GameSessionId>,
}

impl<S> FromRequestParts<RewardsAppState<S>> for AuthUser
where
    S: RewardsStore + Send + Sync + 'static,
{
    type Rejection = RewardsError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RewardsAppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(RewardsError::Unauthorized)?;

        let claims = state.keys.verify(token, state.clock.now())?;
        let role = UserRole::from_code(&claims.role).ok_or(RewardsError::Unauthorized)?;

        Ok(AuthUser {
            user_id: UserId::from_uuid(claims.sub),
            role,
            session_id: claims.sid.map(GameSessionId::from_uuid),
        })
    }
}

/// [`AuthUser`] holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<RewardsAppState<S>> for AdminUser
where
    S: RewardsStore + Send + Sync + 'static,
{
    type Rejection = RewardsError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RewardsAppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(RewardsError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
