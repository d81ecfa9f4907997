//! In-memory store
//!
//! Transactions take one process-wide async lock and work on a copy of the
//! state; `commit` writes the copy back, dropping the transaction discards it.
//! Transactions are therefore fully serialized. Used by tests and local runs
//! without PostgreSQL.

use chrono::{DateTime, Utc};
use kernel::id::{GameSessionId, InventoryItemId, PrizeId, TeamId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::entities::{
    CleanupReport, GameSession, InventoryItem, LaunchCode, Prize, RedeemToken, RefreshCredential,
    Team, User,
};
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::domain::single_use::consume;
use crate::domain::value_objects::ItemStatus;
use crate::error::{RewardsError, RewardsResult};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    users: HashMap<UserId, User>,
    teams: HashMap<TeamId, Team>,
    refresh_credentials: HashMap<String, RefreshCredential>,
    launch_codes: HashMap<String, LaunchCode>,
    redeem_tokens: HashMap<String, RedeemToken>,
    inventory: HashMap<InventoryItemId, InventoryItem>,
    prizes: HashMap<PrizeId, Prize>,
    game_sessions: HashMap<GameSessionId, GameSession>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRewardsStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRewardsStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding and inspection, outside any transaction

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_team(&self, team: Team) {
        self.state.lock().await.teams.insert(team.id, team);
    }

    pub async fn insert_prize(&self, prize: Prize) {
        self.state.lock().await.prizes.insert(prize.id, prize);
    }

    pub async fn user(&self, user_id: UserId) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    pub async fn team(&self, team_id: TeamId) -> Option<Team> {
        self.state.lock().await.teams.get(&team_id).cloned()
    }

    pub async fn prize(&self, prize_id: PrizeId) -> Option<Prize> {
        self.state.lock().await.prizes.get(&prize_id).cloned()
    }

    pub async fn inventory_item(&self, item_id: InventoryItemId) -> Option<InventoryItem> {
        self.state.lock().await.inventory.get(&item_id).cloned()
    }

    pub async fn inventory_of(&self, user_id: UserId) -> Vec<InventoryItem> {
        let state = self.state.lock().await;
        let mut items: Vec<_> = state
            .inventory
            .values()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        items
    }

    pub async fn game_session(&self, session_id: GameSessionId) -> Option<GameSession> {
        self.state.lock().await.game_sessions.get(&session_id).cloned()
    }

    pub async fn refresh_credential(&self, token_hash: &str) -> Option<RefreshCredential> {
        self.state.lock().await.refresh_credentials.get(token_hash).cloned()
    }

    pub async fn launch_code(&self, code: &str) -> Option<LaunchCode> {
        self.state.lock().await.launch_codes.get(code).cloned()
    }

    pub async fn redeem_token_count(&self) -> usize {
        self.state.lock().await.redeem_tokens.len()
    }
}

pub struct MemoryRewardsTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl RewardsStore for MemoryRewardsStore {
    type Tx = MemoryRewardsTx;

    async fn begin(&self) -> RewardsResult<MemoryRewardsTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = (*guard).clone();
        Ok(MemoryRewardsTx { guard, work })
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> RewardsResult<CleanupReport> {
        let mut state = self.state.lock().await;

        let before = (
            state.refresh_credentials.len(),
            state.launch_codes.len(),
            state.redeem_tokens.len(),
        );
        state.refresh_credentials.retain(|_, c| c.expires_at >= now);
        state.launch_codes.retain(|_, c| c.expires_at >= now);
        state.redeem_tokens.retain(|_, t| t.expires_at >= now);

        Ok(CleanupReport {
            refresh_credentials: (before.0 - state.refresh_credentials.len()) as u64,
            launch_codes: (before.1 - state.launch_codes.len()) as u64,
            redeem_tokens: (before.2 - state.redeem_tokens.len()) as u64,
        })
    }
}

fn insert_unique<T: Clone>(map: &mut HashMap<String, T>, key: &str, value: &T) -> RewardsResult<()> {
    if map.contains_key(key) {
        return Err(RewardsError::TokenCollision);
    }
    map.insert(key.to_string(), value.clone());
    Ok(())
}

impl RewardsTx for MemoryRewardsTx {
    async fn find_user(&mut self, user_id: UserId) -> RewardsResult<Option<User>> {
        Ok(self.work.users.get(&user_id).cloned())
    }

    async fn lock_user(&mut self, user_id: UserId) -> RewardsResult<Option<User>> {
        Ok(self.work.users.get(&user_id).cloned())
    }

    async fn save_user(&mut self, user: &User) -> RewardsResult<()> {
        let stored = self.work.users.get_mut(&user.id).ok_or(RewardsError::NotFound)?;
        *stored = user.clone();
        Ok(())
    }

    async fn lock_team(&mut self, team_id: TeamId) -> RewardsResult<Option<Team>> {
        Ok(self.work.teams.get(&team_id).cloned())
    }

    async fn save_team(&mut self, team: &Team) -> RewardsResult<()> {
        let stored = self.work.teams.get_mut(&team.id).ok_or(RewardsError::NotFound)?;
        *stored = team.clone();
        Ok(())
    }

    async fn insert_refresh_credential(&mut self, credential: &RefreshCredential) -> RewardsResult<()> {
        insert_unique(
            &mut self.work.refresh_credentials,
            &credential.token_hash,
            credential,
        )
    }

    async fn find_refresh_credential(&mut self, token_hash: &str) -> RewardsResult<Option<RefreshCredential>> {
        Ok(self.work.refresh_credentials.get(token_hash).cloned())
    }

    async fn consume_refresh_credential(
        &mut self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> RewardsResult<RefreshCredential> {
        let credential = consume(self.work.refresh_credentials.get_mut(token_hash), now)?;
        Ok(credential.clone())
    }

    async fn revoke_refresh_credential(&mut self, token_hash: &str) -> RewardsResult<bool> {
        Ok(match self.work.refresh_credentials.get_mut(token_hash) {
            Some(credential) if !credential.blacklisted => {
                credential.blacklisted = true;
                true
            }
            _ => false,
        })
    }

    async fn insert_launch_code(&mut self, launch_code: &LaunchCode) -> RewardsResult<()> {
        insert_unique(&mut self.work.launch_codes, &launch_code.code, launch_code)
    }

    async fn consume_launch_code(&mut self, code: &str, now: DateTime<Utc>) -> RewardsResult<LaunchCode> {
        let launch_code = consume(self.work.launch_codes.get_mut(code), now)?;
        Ok(launch_code.clone())
    }

    async fn insert_redeem_token(&mut self, redeem_token: &RedeemToken) -> RewardsResult<()> {
        insert_unique(&mut self.work.redeem_tokens, &redeem_token.token, redeem_token)
    }

    async fn take_redeem_token(&mut self, token: &str) -> RewardsResult<Option<RedeemToken>> {
        Ok(self.work.redeem_tokens.remove(token))
    }

    async fn find_inventory_item(&mut self, item_id: InventoryItemId) -> RewardsResult<Option<InventoryItem>> {
        Ok(self.work.inventory.get(&item_id).cloned())
    }

    async fn insert_inventory_item(&mut self, item: &InventoryItem) -> RewardsResult<()> {
        self.work.inventory.insert(item.id, item.clone());
        Ok(())
    }

    async fn mark_item_redeemed(
        &mut self,
        item_id: InventoryItemId,
        now: DateTime<Utc>,
    ) -> RewardsResult<bool> {
        Ok(match self.work.inventory.get_mut(&item_id) {
            Some(item) if item.is_available() => {
                item.status = ItemStatus::Redeemed;
                item.redeemed_at = Some(now);
                true
            }
            _ => false,
        })
    }

    async fn find_prize(&mut self, prize_id: PrizeId) -> RewardsResult<Option<Prize>> {
        Ok(self.work.prizes.get(&prize_id).cloned())
    }

    async fn list_drawable_prizes(&mut self) -> RewardsResult<Vec<Prize>> {
        let mut prizes: Vec<_> = self
            .work
            .prizes
            .values()
            .filter(|prize| prize.is_drawable())
            .cloned()
            .collect();
        prizes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(prizes)
    }

    async fn take_prize_stock(&mut self, prize_id: PrizeId) -> RewardsResult<bool> {
        let Some(prize) = self.work.prizes.get_mut(&prize_id) else {
            return Ok(false);
        };
        Ok(match prize.stock.as_mut() {
            None => true,
            Some(stock) if *stock > 0 => {
                *stock -= 1;
                true
            }
            Some(_) => false,
        })
    }

    async fn insert_game_session(&mut self, session: &GameSession) -> RewardsResult<()> {
        self.work.game_sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn lock_game_session(&mut self, session_id: GameSessionId) -> RewardsResult<Option<GameSession>> {
        Ok(self.work.game_sessions.get(&session_id).cloned())
    }

    async fn complete_game_session(
        &mut self,
        session_id: GameSessionId,
        score: i64,
        now: DateTime<Utc>,
    ) -> RewardsResult<bool> {
        Ok(match self.work.game_sessions.get_mut(&session_id) {
            Some(session) if !session.is_completed() => {
                session.score = Some(score);
                session.completed_at = Some(now);
                true
            }
            _ => false,
        })
    }

    async fn commit(self) -> RewardsResult<()> {
        let MemoryRewardsTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}
