//! Domain Entities
//!
//! Core business entities for the rewards domain.

use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::{GameSessionId, InventoryItemId, PrizeId, TeamId, UserId};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::services::energy::{self, EnergyRefill};
use crate::domain::single_use::SingleUse;
use crate::domain::value_objects::{ItemStatus, PrizeType, ProfilePatch, RarityTier, UserRole};
use crate::error::{RewardsError, RewardsResult};

/// Wallet, energy and score slice of a user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    /// Coin balance, never negative
    pub amount: i64,
    pub energy: i32,
    pub energy_updated_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub team_id: Option<TeamId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(display_name: impl Into<String>, role: UserRole, energy: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            display_name: display_name.into(),
            avatar_url: None,
            role,
            amount: 0,
            energy,
            energy_updated_at: Some(now),
            score: 0,
            team_id: None,
            created_at: now,
        }
    }

    pub fn energy_at(&self, max: i32, rate_seconds: i64, now: DateTime<Utc>) -> EnergyRefill {
        energy::refill(self.energy, max, self.energy_updated_at, rate_seconds, now)
    }

    /// Regenerate, then spend `cost` points. The checkpoint keeps any partial
    /// interval so spending never resets regeneration progress.
    pub fn spend_energy(
        &mut self,
        cost: i32,
        max: i32,
        rate_seconds: i64,
        now: DateTime<Utc>,
    ) -> RewardsResult<EnergyRefill> {
        let refilled = self.energy_at(max, rate_seconds, now);
        if refilled.current < cost {
            return Err(RewardsError::InsufficientEnergy);
        }

        self.energy = refilled.current - cost;
        self.energy_updated_at = Some(refilled.anchor.unwrap_or(now));
        Ok(self.energy_at(max, rate_seconds, now))
    }

    /// Debit the bet and credit a MONEY payout.
    pub fn settle_spin(&mut self, bet: i64, prize: &Prize) -> RewardsResult<()> {
        if self.amount < bet {
            return Err(RewardsError::InsufficientFunds);
        }
        self.amount -= bet;
        if prize.prize_type == PrizeType::Money {
            self.amount += prize.amount;
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: ProfilePatch) {
        if let Some(display_name) = patch.display_name {
            self.display_name = display_name;
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = (!avatar_url.is_empty()).then_some(avatar_url);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub score: i64,
    /// Best single game score submitted by a member
    pub max_score: i64,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TeamId::new(),
            name: name.into(),
            score: 0,
            max_score: 0,
        }
    }

    pub fn record_score(&mut self, score: i64) {
        self.score += score;
        self.max_score = self.max_score.max(score);
    }
}

/// Opaque refresh credential. Only the SHA-256 digest of the value is kept.
///
/// `session_id` is set for credentials born from a webview exchange; access
/// tokens minted from them stay scoped to that session across rotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: UserId,
    pub session_id: Option<GameSessionId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub blacklisted: bool,
}

impl RefreshCredential {
    pub fn new(
        token_hash: String,
        user_id: UserId,
        session_id: Option<GameSessionId>,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_hash,
            user_id,
            session_id,
            created_at: now,
            expires_at: now + ttl,
            blacklisted: false,
        }
    }
}

impl SingleUse for RefreshCredential {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_consumed(&self) -> bool {
        self.blacklisted
    }

    fn mark_consumed(&mut self, _now: DateTime<Utc>) {
        self.blacklisted = true;
    }
}

/// One-time code handing a user and game session over to the webview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCode {
    pub id: Uuid,
    pub code: String,
    pub user_id: UserId,
    pub session_id: GameSessionId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl LaunchCode {
    pub fn new(
        code: String,
        user_id: UserId,
        session_id: GameSessionId,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            user_id,
            session_id,
            created_at: now,
            expires_at: now + ttl,
            used_at: None,
        }
    }
}

impl SingleUse for LaunchCode {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_consumed(&self) -> bool {
        self.used_at.is_some()
    }

    fn mark_consumed(&mut self, now: DateTime<Utc>) {
        self.used_at = Some(now);
    }
}

/// QR token that lets staff hand out an inventory item. Redeeming deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: UserId,
    pub item_id: InventoryItemId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RedeemToken {
    pub fn new(
        token: String,
        user_id: UserId,
        item_id: InventoryItemId,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            user_id,
            item_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub id: GameSessionId,
    pub user_id: UserId,
    pub game_id: String,
    pub energy_cost: i32,
    pub score: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn new(user_id: UserId, game_id: impl Into<String>, energy_cost: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: GameSessionId::new(),
            user_id,
            game_id: game_id.into(),
            energy_cost,
            score: None,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prize {
    pub id: PrizeId,
    pub name: String,
    pub prize_type: PrizeType,
    /// Coins paid out for MONEY prizes
    pub amount: i64,
    pub rarity: RarityTier,
    /// `None` means unlimited
    pub stock: Option<i32>,
    pub emoji: Option<String>,
    pub is_active: bool,
}

impl Prize {
    pub fn new(
        name: impl Into<String>,
        prize_type: PrizeType,
        amount: i64,
        rarity: RarityTier,
        stock: Option<i32>,
    ) -> Self {
        Self {
            id: PrizeId::new(),
            name: name.into(),
            prize_type,
            amount,
            rarity,
            stock,
            emoji: None,
            is_active: true,
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.is_active && self.stock.is_none_or(|stock| stock > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub prize_id: PrizeId,
    pub user_id: UserId,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl InventoryItem {
    pub fn new(prize_id: PrizeId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: InventoryItemId::new(),
            prize_id,
            user_id,
            status: ItemStatus::Available,
            created_at: now,
            redeemed_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::Available
    }
}

/// What the staff console shows after a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub item_id: InventoryItemId,
    pub item_name: String,
    pub user_display_name: String,
    pub redeemed_at: DateTime<Utc>,
}

/// Counts removed by an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub refresh_credentials: u64,
    pub launch_codes: u64,
    pub redeem_tokens: u64,
}
