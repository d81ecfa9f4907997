//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the infra layer.
//!
//! Every use case runs inside one [`RewardsTx`]. Dropping a transaction
//! without calling [`RewardsTx::commit`] rolls it back.

use chrono::{DateTime, Utc};
use kernel::id::{GameSessionId, InventoryItemId, PrizeId, TeamId, UserId};

use crate::domain::entities::{
    CleanupReport, GameSession, InventoryItem, LaunchCode, Prize, RedeemToken, RefreshCredential,
    Team, User,
};
use crate::error::RewardsResult;

#[trait_variant::make(RewardsStore: Send)]
pub trait LocalRewardsStore {
    type Tx: RewardsTx + Send;

    async fn begin(&self) -> RewardsResult<Self::Tx>;

    /// Delete credentials whose expiry is in the past.
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> RewardsResult<CleanupReport>;
}

#[trait_variant::make(RewardsTx: Send)]
pub trait LocalRewardsTx {
    // Users and teams

    async fn find_user(&mut self, user_id: UserId) -> RewardsResult<Option<User>>;

    /// Read and row-lock for the rest of the transaction.
    async fn lock_user(&mut self, user_id: UserId) -> RewardsResult<Option<User>>;

    /// Persist the mutable fields of a locked user.
    async fn save_user(&mut self, user: &User) -> RewardsResult<()>;

    async fn lock_team(&mut self, team_id: TeamId) -> RewardsResult<Option<Team>>;

    async fn save_team(&mut self, team: &Team) -> RewardsResult<()>;

    // Refresh credentials

    /// Fails with `TokenCollision` if the hash already exists.
    async fn insert_refresh_credential(&mut self, credential: &RefreshCredential) -> RewardsResult<()>;

    async fn find_refresh_credential(&mut self, token_hash: &str) -> RewardsResult<Option<RefreshCredential>>;

    /// Blacklist a live credential. Exactly one concurrent caller succeeds;
    /// the others get `AlreadyConsumed`, `Expired` or `NotFound`.
    async fn consume_refresh_credential(
        &mut self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> RewardsResult<RefreshCredential>;

    /// Blacklist regardless of state. Returns whether this call did the blacklisting.
    async fn revoke_refresh_credential(&mut self, token_hash: &str) -> RewardsResult<bool>;

    // Launch codes

    async fn insert_launch_code(&mut self, launch_code: &LaunchCode) -> RewardsResult<()>;

    /// Mark used. Exactly one concurrent caller succeeds.
    async fn consume_launch_code(&mut self, code: &str, now: DateTime<Utc>) -> RewardsResult<LaunchCode>;

    // Redeem tokens

    async fn insert_redeem_token(&mut self, redeem_token: &RedeemToken) -> RewardsResult<()>;

    /// Delete and return, expired or not. Exactly one concurrent caller gets the row.
    async fn take_redeem_token(&mut self, token: &str) -> RewardsResult<Option<RedeemToken>>;

    // Inventory and prizes

    async fn find_inventory_item(&mut self, item_id: InventoryItemId) -> RewardsResult<Option<InventoryItem>>;

    async fn insert_inventory_item(&mut self, item: &InventoryItem) -> RewardsResult<()>;

    /// AVAILABLE -> REDEEMED. `false` when the item was not available.
    async fn mark_item_redeemed(
        &mut self,
        item_id: InventoryItemId,
        now: DateTime<Utc>,
    ) -> RewardsResult<bool>;

    async fn find_prize(&mut self, prize_id: PrizeId) -> RewardsResult<Option<Prize>>;

    /// Active prizes with stock left (or unlimited).
    async fn list_drawable_prizes(&mut self) -> RewardsResult<Vec<Prize>>;

    /// Decrement finite stock. `false` when it already reached zero.
    async fn take_prize_stock(&mut self, prize_id: PrizeId) -> RewardsResult<bool>;

    // Game sessions

    async fn insert_game_session(&mut self, session: &GameSession) -> RewardsResult<()>;

    async fn lock_game_session(&mut self, session_id: GameSessionId) -> RewardsResult<Option<GameSession>>;

    /// Record the score once. `false` when the session was already completed.
    async fn complete_game_session(
        &mut self,
        session_id: GameSessionId,
        score: i64,
        now: DateTime<Utc>,
    ) -> RewardsResult<bool>;

    async fn commit(self) -> RewardsResult<()>;
}
