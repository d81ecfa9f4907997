//! Spin Wheel Use Case

use kernel::clock::Clock;
use kernel::id::{InventoryItemId, UserId};
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::domain::entities::{InventoryItem, Prize};
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::domain::services::prize_selector::select_index;
use crate::domain::value_objects::PrizeType;
use crate::error::{RewardsError, RewardsResult};

#[derive(Debug, Clone)]
pub struct SpinOutcome {
    pub prize: Prize,
    pub bet: i64,
    /// Wallet after the bet and any payout
    pub balance: i64,
    pub inventory_item_id: Option<InventoryItemId>,
}

pub struct SpinWheelUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    config: Arc<RewardsConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> SpinWheelUseCase<S>
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

    pub async fn spin(&self, user_id: UserId, bet: i64) -> RewardsResult<SpinOutcome> {
        if bet < 0 {
            return Err(RewardsError::InvalidInput("bet must not be negative".into()));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut user = tx.lock_user(user_id).await?.ok_or(RewardsError::NotFound)?;
        if user.amount < bet {
            return Err(RewardsError::InsufficientFunds);
        }

        let mut candidates = tx.list_drawable_prizes().await?;
        let prize = loop {
            let index = select_index(&candidates, self.config.prize_weighting, &mut rand::rng())?;
            let prize = candidates.swap_remove(index);
            if prize.stock.is_none() || tx.take_prize_stock(prize.id).await? {
                break prize;
            }
            tracing::debug!(prize_id = %prize.id, "Prize sold out during draw, redrawing");
        };

        user.settle_spin(bet, &prize)?;
        tx.save_user(&user).await?;

        let inventory_item_id = if prize.prize_type == PrizeType::Item {
            let item = InventoryItem::new(prize.id, user.id, now);
            tx.insert_inventory_item(&item).await?;
            Some(item.id)
        } else {
            None
        };
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            bet,
            prize = %prize.name,
            prize_type = prize.prize_type.code(),
            balance = user.amount,
            "Wheel spun"
        );

        Ok(SpinOutcome {
            prize,
            bet,
            balance: user.amount,
            inventory_item_id,
        })
    }
}
