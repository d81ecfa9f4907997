//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use kernel::id::{GameSessionId, InventoryItemId, PrizeId, UserId};
use serde::{Deserialize, Serialize};

use crate::application::issuance::TokenPair;
use crate::application::launch_game::{IssuedLaunchCode, LaunchOutput};
use crate::application::redeem_prize::IssuedRedeemToken;
use crate::application::spin_wheel::SpinOutcome;
use crate::application::submit_score::ScoreOutcome;
use crate::domain::entities::{Prize, User};
use crate::domain::services::energy::EnergyState;
use crate::domain::value_objects::{PrizeType, RarityTier, UserRole};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Header echoing the CSRF cookie when the refresh cookie authenticates.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Request for POST /auth/refresh and POST /auth/logout.
/// Browsers send the token as a cookie instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Response for POST /auth/refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: pair.access_expires_in,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Request for POST /auth/webview/exchange
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub code: String,
}

/// Response for POST /auth/webview/exchange. The refresh token only travels
/// in the HttpOnly cookie.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user_id: UserId,
    pub session_id: GameSessionId,
}

/// Response for POST /games/{game_id}/launch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub session_id: GameSessionId,
    pub launch_url: String,
    pub expires_at: DateTime<Utc>,
    pub energy: EnergyState,
}

impl From<LaunchOutput> for LaunchResponse {
    fn from(output: LaunchOutput) -> Self {
        Self {
            session_id: output.session_id,
            launch_url: output.launch_url,
            expires_at: output.expires_at,
            energy: output.energy,
        }
    }
}

/// Response for POST /game/sessions/{session_id}/launch-code
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchCodeResponse {
    pub session_id: GameSessionId,
    pub launch_url: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedLaunchCode> for LaunchCodeResponse {
    fn from(issued: IssuedLaunchCode) -> Self {
        Self {
            session_id: issued.session_id,
            launch_url: issued.launch_url,
            expires_at: issued.expires_at,
        }
    }
}

/// Request for POST /game/score
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub session_id: GameSessionId,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub session_id: GameSessionId,
    pub score: i64,
    pub total_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_score: Option<i64>,
}

impl From<ScoreOutcome> for ScoreResponse {
    fn from(outcome: ScoreOutcome) -> Self {
        Self {
            session_id: outcome.session_id,
            score: outcome.score,
            total_score: outcome.user_score,
            team_score: outcome.team_score,
        }
    }
}

/// Request for POST /casino/spin
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinRequest {
    pub bet: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeView {
    pub id: PrizeId,
    pub name: String,
    pub prize_type: PrizeType,
    pub amount: i64,
    pub rarity: RarityTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl From<Prize> for PrizeView {
    fn from(prize: Prize) -> Self {
        Self {
            id: prize.id,
            name: prize.name,
            prize_type: prize.prize_type,
            amount: prize.amount,
            rarity: prize.rarity,
            emoji: prize.emoji,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    pub prize: PrizeView,
    pub bet: i64,
    pub balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_item_id: Option<InventoryItemId>,
}

impl From<SpinOutcome> for SpinResponse {
    fn from(outcome: SpinOutcome) -> Self {
        Self {
            prize: outcome.prize.into(),
            bet: outcome.bet,
            balance: outcome.balance,
            inventory_item_id: outcome.inventory_item_id,
        }
    }
}

/// Response for PATCH /profile/me
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub amount: i64,
    pub score: i64,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            role: user.role,
            amount: user.amount,
            score: user.score,
        }
    }
}

/// Response for POST /profile/inventory/{item_id}/code
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCodeResponse {
    pub token: String,
    pub item_id: InventoryItemId,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

impl From<IssuedRedeemToken> for RedeemCodeResponse {
    fn from(issued: IssuedRedeemToken) -> Self {
        Self {
            token: issued.token,
            item_id: issued.item_id,
            expires_at: issued.expires_at,
            expires_in: issued.expires_in_seconds,
        }
    }
}

/// Request for POST /admin/prizes/redeem
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub token: String,
}
