//! Refresh Session Use Case
//!
//! Issues access/refresh pairs, rotates refresh credentials and revokes them.

use kernel::clock::Clock;
use kernel::id::UserId;
use platform::jwt::{AccessClaims, JwtKeys};
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::application::issuance::{self, TokenPair, refresh_token_hash};
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::error::{RewardsError, RewardsResult};

pub struct RefreshSessionUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    keys: Arc<JwtKeys>,
    config: Arc<RewardsConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> RefreshSessionUseCase<S>
where
    S: RewardsStore,
{
    pub fn new(
        store: Arc<S>,
        keys: Arc<JwtKeys>,
        config: Arc<RewardsConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            keys,
            config,
            clock,
        }
    }

    /// New session for an authenticated user (login, registration).
    pub async fn issue_pair(&self, user_id: UserId) -> RewardsResult<TokenPair> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let user = tx.find_user(user_id).await?.ok_or(RewardsError::NotFound)?;
        let refresh_token =
            issuance::issue_refresh_credential(&mut tx, user.id, None, now, &self.config).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Issued token pair");

        issuance::token_pair(&self.keys, &user, None, refresh_token, now, &self.config)
    }

    /// Trade a live refresh token for a new pair. The old token is blacklisted
    /// in the same transaction that stores its replacement.
    pub async fn rotate(&self, presented: &str) -> RewardsResult<TokenPair> {
        let now = self.clock.now();
        let token_hash = refresh_token_hash(presented);
        let mut tx = self.store.begin().await?;

        let previous = match tx.consume_refresh_credential(&token_hash, now).await {
            Ok(credential) => credential,
            Err(RewardsError::AlreadyConsumed) => {
                tracing::warn!("Blacklisted refresh token presented again");
                return Err(RewardsError::Unauthorized);
            }
            Err(RewardsError::Expired | RewardsError::NotFound) => {
                return Err(RewardsError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        let user = tx
            .find_user(previous.user_id)
            .await?
            .ok_or(RewardsError::Unauthorized)?;
        let refresh_token = issuance::issue_refresh_credential(
            &mut tx,
            user.id,
            previous.session_id,
            now,
            &self.config,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, credential_id = %previous.id, "Rotated refresh token");

        issuance::token_pair(
            &self.keys,
            &user,
            previous.session_id,
            refresh_token,
            now,
            &self.config,
        )
    }

    /// Logout. Unknown and already revoked tokens succeed too.
    pub async fn revoke(&self, presented: &str) -> RewardsResult<()> {
        let token_hash = refresh_token_hash(presented);
        let mut tx = self.store.begin().await?;
        let revoked = tx.revoke_refresh_credential(&token_hash).await?;
        tx.commit().await?;

        tracing::debug!(revoked, "Refresh token revoke requested");
        Ok(())
    }

    pub fn verify_access(&self, token: &str) -> RewardsResult<AccessClaims> {
        Ok(self.keys.verify(token, self.clock.now())?)
    }
}
