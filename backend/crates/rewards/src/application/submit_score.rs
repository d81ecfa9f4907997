//! Submit Score Use Case
//!
//! Closes a game session and credits the score to the player and team.
//! Locks are taken session first, then user, then team.

use kernel::clock::Clock;
use kernel::id::{GameSessionId, UserId};
use std::sync::Arc;

use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::error::{RewardsError, RewardsResult};

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub session_id: GameSessionId,
    pub score: i64,
    pub user_score: i64,
    pub team_score: Option<i64>,
}

pub struct SubmitScoreUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> SubmitScoreUseCase<S>
where
    S: RewardsStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn submit(
        &self,
        user_id: UserId,
        session_id: GameSessionId,
        score: i64,
    ) -> RewardsResult<ScoreOutcome> {
        if score < 0 {
            return Err(RewardsError::InvalidInput("score must not be negative".into()));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let session = tx
            .lock_game_session(session_id)
            .await?
            .filter(|session| session.user_id == user_id)
            .ok_or(RewardsError::NotFound)?;
        if session.is_completed() || !tx.complete_game_session(session.id, score, now).await? {
            return Err(RewardsError::SessionCompleted);
        }

        let mut user = tx.lock_user(user_id).await?.ok_or(RewardsError::NotFound)?;
        user.score += score;
        tx.save_user(&user).await?;

        let team_score = match user.team_id {
            Some(team_id) => match tx.lock_team(team_id).await? {
                Some(mut team) => {
                    team.record_score(score);
                    tx.save_team(&team).await?;
                    Some(team.score)
                }
                None => None,
            },
            None => None,
        };
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            score,
            "Score submitted"
        );

        Ok(ScoreOutcome {
            session_id: session.id,
            score,
            user_score: user.score,
            team_score,
        })
    }
}
