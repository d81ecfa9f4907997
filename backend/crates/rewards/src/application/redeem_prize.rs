//! Redeem Prize Use Case
//!
//! A player shows a short-lived QR token for an inventory item; staff scan it
//! and the item is handed out exactly once.

use chrono::{DateTime, Utc};
use kernel::clock::Clock;
use kernel::id::{InventoryItemId, UserId};
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::application::issuance;
use crate::domain::entities::RedemptionRecord;
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::error::{RewardsError, RewardsResult};

#[derive(Debug, Clone)]
pub struct IssuedRedeemToken {
    pub token: String,
    pub item_id: InventoryItemId,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

pub struct RedeemPrizeUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    config: Arc<RewardsConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> RedeemPrizeUseCase<S>
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

    pub async fn issue_token(
        &self,
        user_id: UserId,
        item_id: InventoryItemId,
    ) -> RewardsResult<IssuedRedeemToken> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let item = tx
            .find_inventory_item(item_id)
            .await?
            .ok_or(RewardsError::NotFound)?;
        if item.user_id != user_id {
            return Err(RewardsError::Forbidden);
        }
        if !item.is_available() {
            return Err(RewardsError::NotFound);
        }

        let redeem_token =
            issuance::issue_redeem_token(&mut tx, user_id, item.id, now, &self.config).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, item_id = %item.id, "Redeem token issued");

        Ok(IssuedRedeemToken {
            expires_in_seconds: (redeem_token.expires_at - now).num_seconds(),
            token: redeem_token.token,
            item_id: item.id,
            expires_at: redeem_token.expires_at,
        })
    }

    /// Staff side. The token row is deleted whatever the outcome, so a
    /// second scan of the same QR code finds nothing.
    pub async fn redeem(&self, token: &str) -> RewardsResult<RedemptionRecord> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let Some(redeem_token) = tx.take_redeem_token(token.trim()).await? else {
            return Err(RewardsError::NotFound);
        };

        if redeem_token.is_expired(now) {
            tx.commit().await?;
            tracing::info!(item_id = %redeem_token.item_id, "Expired redeem token scanned");
            return Err(RewardsError::Gone);
        }

        if !tx.mark_item_redeemed(redeem_token.item_id, now).await? {
            tx.commit().await?;
            tracing::warn!(item_id = %redeem_token.item_id, "Item already redeemed");
            return Err(RewardsError::Gone);
        }

        let item = tx
            .find_inventory_item(redeem_token.item_id)
            .await?
            .ok_or(RewardsError::NotFound)?;
        let prize = tx
            .find_prize(item.prize_id)
            .await?
            .ok_or_else(|| RewardsError::Internal(format!("prize {} missing", item.prize_id)))?;
        let owner = tx
            .find_user(item.user_id)
            .await?
            .ok_or(RewardsError::NotFound)?;
        tx.commit().await?;

        tracing::info!(
            item_id = %item.id,
            user_id = %owner.id,
            prize = %prize.name,
            "Prize redeemed"
        );

        Ok(RedemptionRecord {
            item_id: item.id,
            item_name: prize.name,
            user_display_name: owner.display_name,
            redeemed_at: now,
        })
    }
}
