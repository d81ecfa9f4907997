//! Launch Game Use Case
//!
//! Spends energy, opens a game session and hands it to the webview through
//! a one-time launch code. The webview trades the code for its own tokens.

use chrono::{DateTime, Utc};
use kernel::clock::Clock;
use kernel::id::{GameSessionId, UserId};
use platform::jwt::JwtKeys;
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::application::issuance::{self, TokenPair};
use crate::domain::entities::GameSession;
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::domain::services::energy::EnergyState;
use crate::error::{RewardsError, RewardsResult};

pub const GAME_ID_MAX_CHARS: usize = 64;

/// Output DTO for launch
#[derive(Debug, Clone)]
pub struct LaunchOutput {
    pub session_id: GameSessionId,
    pub launch_code: String,
    pub launch_url: String,
    pub expires_at: DateTime<Utc>,
    pub energy: EnergyState,
}

/// Launch code issued for an already open session
#[derive(Debug, Clone)]
pub struct IssuedLaunchCode {
    pub session_id: GameSessionId,
    pub launch_code: String,
    pub launch_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Output DTO for the webview exchange
#[derive(Debug, Clone)]
pub struct ExchangeOutput {
    pub user_id: UserId,
    pub session_id: GameSessionId,
    pub tokens: TokenPair,
}

pub struct LaunchGameUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    keys: Arc<JwtKeys>,
    config: Arc<RewardsConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> LaunchGameUseCase<S>
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

    pub async fn launch(&self, user_id: UserId, game_id: &str) -> RewardsResult<LaunchOutput> {
        let game_id = game_id.trim();
        if game_id.is_empty() || game_id.chars().count() > GAME_ID_MAX_CHARS {
            return Err(RewardsError::InvalidInput(format!(
                "game id must be 1..={GAME_ID_MAX_CHARS} characters"
            )));
        }

        let now = self.clock.now();
        let config = &self.config;
        let mut tx = self.store.begin().await?;

        let mut user = tx.lock_user(user_id).await?.ok_or(RewardsError::NotFound)?;
        let refill = user.spend_energy(
            config.game_energy_cost,
            config.energy_max,
            config.energy_refill_secs(),
            now,
        )?;
        tx.save_user(&user).await?;

        let session = GameSession::new(user.id, game_id, config.game_energy_cost, now);
        tx.insert_game_session(&session).await?;

        let launch_code = issuance::issue_launch_code(&mut tx, user.id, session.id, now, config).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            game_id = %session.game_id,
            energy = refill.current,
            "Game launched"
        );

        Ok(LaunchOutput {
            session_id: session.id,
            launch_url: config.launch_url(&session.id.to_string(), &launch_code.code),
            launch_code: launch_code.code,
            expires_at: launch_code.expires_at,
            energy: refill.state(config.energy_max),
        })
    }

    /// Fresh launch code for a session the user still has open, e.g. after
    /// the webview was closed before the first code was exchanged.
    pub async fn issue_code(
        &self,
        user_id: UserId,
        session_id: GameSessionId,
    ) -> RewardsResult<IssuedLaunchCode> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let session = tx
            .lock_game_session(session_id)
            .await?
            .filter(|session| session.user_id == user_id)
            .ok_or(RewardsError::NotFound)?;
        if session.is_completed() {
            return Err(RewardsError::SessionCompleted);
        }

        let launch_code =
            issuance::issue_launch_code(&mut tx, user_id, session.id, now, &self.config).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, session_id = %session.id, "Launch code reissued");

        Ok(IssuedLaunchCode {
            session_id: session.id,
            launch_url: self
                .config
                .launch_url(&session.id.to_string(), &launch_code.code),
            launch_code: launch_code.code,
            expires_at: launch_code.expires_at,
        })
    }

    /// Trade a launch code for a session-scoped access token and a refresh
    /// token. Every rejection looks the same to the caller.
    pub async fn exchange(&self, code: &str) -> RewardsResult<ExchangeOutput> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let launch_code = match tx.consume_launch_code(code.trim(), now).await {
            Ok(launch_code) => launch_code,
            Err(RewardsError::AlreadyConsumed) => {
                tracing::warn!("Launch code presented twice");
                return Err(RewardsError::Unauthorized);
            }
            Err(RewardsError::Expired | RewardsError::NotFound) => {
                return Err(RewardsError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        let user = tx
            .find_user(launch_code.user_id)
            .await?
            .ok_or(RewardsError::Unauthorized)?;
        let refresh_token = issuance::issue_refresh_credential(
            &mut tx,
            user.id,
            Some(launch_code.session_id),
            now,
            &self.config,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            session_id = %launch_code.session_id,
            "Launch code exchanged"
        );

        let tokens = issuance::token_pair(
            &self.keys,
            &user,
            Some(launch_code.session_id),
            refresh_token,
            now,
            &self.config,
        )?;

        Ok(ExchangeOutput {
            user_id: user.id,
            session_id: launch_code.session_id,
            tokens,
        })
    }
}
