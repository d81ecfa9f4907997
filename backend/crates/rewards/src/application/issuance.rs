//! Credential issuance shared by the use cases
//!
//! Values come from the CSPRNG; a unique-constraint hit regenerates the value,
//! at most `max_issue_attempts` times per credential.

use chrono::{DateTime, Utc};
use kernel::id::{GameSessionId, InventoryItemId, UserId};
use platform::crypto::{random_alphanumeric, random_urlsafe_token, sha256_hex};
use platform::jwt::{AccessClaims, JwtKeys};

use crate::application::config::RewardsConfig;
use crate::domain::entities::{LaunchCode, RedeemToken, RefreshCredential, User};
use crate::domain::repository::RewardsTx;
use crate::error::{RewardsError, RewardsResult};

/// Access and refresh token handed to a client.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_in: i64,
    pub refresh_token: String,
}

/// Digest under which a refresh token is stored and looked up.
pub fn refresh_token_hash(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

/// Store a new refresh credential; returns the plaintext token.
///
/// A `session_id` carries the webview scope into every rotation.
pub async fn issue_refresh_credential<T: RewardsTx + Send>(
    tx: &mut T,
    user_id: UserId,
    session_id: Option<GameSessionId>,
    now: DateTime<Utc>,
    config: &RewardsConfig,
) -> RewardsResult<String> {
    for attempt in 1..=config.max_issue_attempts {
        let token = random_urlsafe_token(config.refresh_token_bytes);
        let credential = RefreshCredential::new(
            refresh_token_hash(&token),
            user_id,
            session_id,
            now,
            config.refresh_token_ttl_delta(),
        );
        match tx.insert_refresh_credential(&credential).await {
            Ok(()) => return Ok(token),
            Err(RewardsError::TokenCollision) => {
                tracing::warn!(attempt, "Refresh token collision, regenerating");
            }
            Err(e) => return Err(e),
        }
    }
    Err(RewardsError::TokenCollision)
}

pub async fn issue_launch_code<T: RewardsTx + Send>(
    tx: &mut T,
    user_id: UserId,
    session_id: GameSessionId,
    now: DateTime<Utc>,
    config: &RewardsConfig,
) -> RewardsResult<LaunchCode> {
    for attempt in 1..=config.max_issue_attempts {
        let launch_code = LaunchCode::new(
            random_urlsafe_token(config.launch_code_bytes),
            user_id,
            session_id,
            now,
            config.launch_code_ttl_delta(),
        );
        match tx.insert_launch_code(&launch_code).await {
            Ok(()) => return Ok(launch_code),
            Err(RewardsError::TokenCollision) => {
                tracing::warn!(attempt, "Launch code collision, regenerating");
            }
            Err(e) => return Err(e),
        }
    }
    Err(RewardsError::TokenCollision)
}

pub async fn issue_redeem_token<T: RewardsTx + Send>(
    tx: &mut T,
    user_id: UserId,
    item_id: InventoryItemId,
    now: DateTime<Utc>,
    config: &RewardsConfig,
) -> RewardsResult<RedeemToken> {
    for attempt in 1..=config.max_issue_attempts {
        let redeem_token = RedeemToken::new(
            random_alphanumeric(config.redeem_token_len),
            user_id,
            item_id,
            now,
            config.redeem_token_ttl_delta(),
        );
        match tx.insert_redeem_token(&redeem_token).await {
            Ok(()) => return Ok(redeem_token),
            Err(RewardsError::TokenCollision) => {
                tracing::warn!(attempt, "Redeem token collision, regenerating");
            }
            Err(e) => return Err(e),
        }
    }
    Err(RewardsError::TokenCollision)
}

/// Signed access token; never stored.
pub fn mint_access_token(
    keys: &JwtKeys,
    user: &User,
    session_id: Option<GameSessionId>,
    now: DateTime<Utc>,
    config: &RewardsConfig,
) -> RewardsResult<String> {
    let mut claims = AccessClaims::new(
        user.id.into_uuid(),
        user.role.code(),
        now,
        config.access_token_ttl_delta(),
    );
    if let Some(session_id) = session_id {
        claims = claims.scoped_to_session(session_id.into_uuid());
    }
    Ok(keys.sign(&claims)?)
}

pub fn token_pair(
    keys: &JwtKeys,
    user: &User,
    session_id: Option<GameSessionId>,
    refresh_token: String,
    now: DateTime<Utc>,
    config: &RewardsConfig,
) -> RewardsResult<TokenPair> {
    Ok(TokenPair {
        access_token: mint_access_token(keys, user, session_id, now, config)?,
        access_expires_in: config.access_token_ttl_delta().num_seconds(),
        refresh_token,
    })
}
