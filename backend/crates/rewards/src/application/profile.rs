//! Profile Use Case

use kernel::clock::Clock;
use kernel::id::UserId;
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::domain::entities::User;
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::domain::services::energy::EnergyState;
use crate::domain::value_objects::ProfilePatch;
use crate::error::{RewardsError, RewardsResult};

pub struct ProfileUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    config: Arc<RewardsConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> ProfileUseCase<S>
where
    S: RewardsStore,
{
    pub fn new(store: Arc<S>, config: Arc<RewardsConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Current energy, regenerated up to now. Read only.
    pub async fn energy_status(&self, user_id: UserId) -> RewardsResult<EnergyState> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let user = tx.find_user(user_id).await?.ok_or(RewardsError::NotFound)?;
        drop(tx);

        let max = self.config.energy_max;
        Ok(user
            .energy_at(max, self.config.energy_refill_secs(), now)
            .state(max))
    }

    pub async fn patch_profile(&self, user_id: UserId, patch: ProfilePatch) -> RewardsResult<User> {
        let patch = patch.normalized()?;
        if patch.is_empty() {
            return Err(RewardsError::InvalidInput("nothing to update".into()));
        }

        let mut tx = self.store.begin().await?;
        let mut user = tx.lock_user(user_id).await?.ok_or(RewardsError::NotFound)?;
        user.apply_patch(patch);
        tx.save_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}
