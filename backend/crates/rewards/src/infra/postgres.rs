//! PostgreSQL Store
//!
//! Single-use transitions are one conditional statement each; the returned
//! row (or affected-row count) decides the winner. Rows that a use case
//! reads and then rewrites are taken with `FOR UPDATE`.

use chrono::{DateTime, Utc};
use kernel::id::{GameSessionId, InventoryItemId, PrizeId, TeamId, UserId};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entities::{
    CleanupReport, GameSession, InventoryItem, LaunchCode, Prize, RedeemToken, RefreshCredential,
    Team, User,
};
use crate::domain::repository::{RewardsStore, RewardsTx};
use crate::domain::single_use::{ConsumeRejection, SingleUse};
use crate::domain::value_objects::{ItemStatus, PrizeType, RarityTier, UserRole};
use crate::error::{RewardsError, RewardsResult};

const USER_COLUMNS: &str = "id, display_name, avatar_url, role, amount, energy, energy_updated_at, score, team_id, created_at";
const REFRESH_COLUMNS: &str =
    "id, token_hash, user_id, session_id, created_at, expires_at, blacklisted";
const LAUNCH_CODE_COLUMNS: &str = "id, code, user_id, session_id, created_at, expires_at, used_at";
const REDEEM_TOKEN_COLUMNS: &str = "id, token, user_id, item_id, created_at, expires_at";
const ITEM_COLUMNS: &str = "id, prize_id, user_id, status, created_at, redeemed_at";
const PRIZE_COLUMNS: &str = "id, name, prize_type, amount, rarity, stock, emoji, is_active";
const SESSION_COLUMNS: &str = "id, user_id, game_id, energy_cost, score, created_at, completed_at";

#[derive(Clone)]
pub struct PgRewardsStore {
    pool: PgPool,
}

impl PgRewardsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgRewardsTx {
    tx: Transaction<'static, Postgres>,
}

impl RewardsStore for PgRewardsStore {
    type Tx = PgRewardsTx;

    async fn begin(&self) -> RewardsResult<PgRewardsTx> {
        Ok(PgRewardsTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> RewardsResult<CleanupReport> {
        let refresh_credentials =
            sqlx::query("DELETE FROM refresh_credentials WHERE expires_at < $1")
                .bind(now)
                .execute(&self.pool)
                .await?
                .rows_affected();

        let launch_codes = sqlx::query("DELETE FROM launch_codes WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let redeem_tokens = sqlx::query("DELETE FROM redeem_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!(
            refresh_credentials,
            launch_codes,
            redeem_tokens,
            "Deleted expired credential rows"
        );

        Ok(CleanupReport {
            refresh_credentials,
            launch_codes,
            redeem_tokens,
        })
    }
}

impl PgRewardsTx {
    async fn fetch_user(&mut self, user_id: UserId, lock: bool) -> RewardsResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    /// Classify a consume miss from the row as it is now.
    fn rejection<T: SingleUse>(record: Option<T>, now: DateTime<Utc>) -> RewardsError {
        let rejection = match record {
            None => ConsumeRejection::NotFound,
            Some(record) => record
                .check_consumable(now)
                .err()
                // Still consumable means a concurrent winner rolled back after
                // our statement was evaluated; report it as taken.
                .unwrap_or(ConsumeRejection::AlreadyConsumed),
        };
        rejection.into()
    }
}

impl RewardsTx for PgRewardsTx {
    async fn find_user(&mut self, user_id: UserId) -> RewardsResult<Option<User>> {
        self.fetch_user(user_id, false).await
    }

    async fn lock_user(&mut self, user_id: UserId) -> RewardsResult<Option<User>> {
        self.fetch_user(user_id, true).await
    }

    async fn save_user(&mut self, user: &User) -> RewardsResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET display_name = $2,
                avatar_url = $3,
                amount = $4,
                energy = $5,
                energy_updated_at = $6,
                score = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.into_uuid())
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(user.amount)
        .bind(user.energy)
        .bind(user.energy_updated_at)
        .bind(user.score)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(RewardsError::NotFound);
        }
        Ok(())
    }

    async fn lock_team(&mut self, team_id: TeamId) -> RewardsResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, name, score, max_score FROM teams WHERE id = $1 FOR UPDATE",
        )
        .bind(team_id.into_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(TeamRow::into_team))
    }

    async fn save_team(&mut self, team: &Team) -> RewardsResult<()> {
        let updated = sqlx::query("UPDATE teams SET score = $2, max_score = $3 WHERE id = $1")
            .bind(team.id.into_uuid())
            .bind(team.score)
            .bind(team.max_score)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(RewardsError::NotFound);
        }
        Ok(())
    }

    async fn insert_refresh_credential(&mut self, credential: &RefreshCredential) -> RewardsResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO refresh_credentials
                (id, token_hash, user_id, session_id, created_at, expires_at, blacklisted)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(credential.id)
        .bind(&credential.token_hash)
        .bind(credential.user_id.into_uuid())
        .bind(credential.session_id.map(GameSessionId::into_uuid))
        .bind(credential.created_at)
        .bind(credential.expires_at)
        .bind(credential.blacklisted)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(RewardsError::TokenCollision);
        }
        Ok(())
    }

    async fn find_refresh_credential(&mut self, token_hash: &str) -> RewardsResult<Option<RefreshCredential>> {
        let sql = format!("SELECT {REFRESH_COLUMNS} FROM refresh_credentials WHERE token_hash = $1");
        let row = sqlx::query_as::<_, RefreshRow>(&sql)
            .bind(token_hash)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(RefreshRow::into_credential))
    }

    async fn consume_refresh_credential(
        &mut self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> RewardsResult<RefreshCredential> {
        let sql = format!(
            r#"
            UPDATE refresh_credentials
            SET blacklisted = TRUE
            WHERE token_hash = $1 AND NOT blacklisted AND expires_at > $2
            RETURNING {REFRESH_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RefreshRow>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(row.into_credential()),
            None => {
                let existing = self.find_refresh_credential(token_hash).await?;
                Err(Self::rejection(existing, now))
            }
        }
    }

    async fn revoke_refresh_credential(&mut self, token_hash: &str) -> RewardsResult<bool> {
        let revoked = sqlx::query(
            "UPDATE refresh_credentials SET blacklisted = TRUE WHERE token_hash = $1 AND NOT blacklisted",
        )
        .bind(token_hash)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(revoked == 1)
    }

    async fn insert_launch_code(&mut self, launch_code: &LaunchCode) -> RewardsResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO launch_codes (id, code, user_id, session_id, created_at, expires_at, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(launch_code.id)
        .bind(&launch_code.code)
        .bind(launch_code.user_id.into_uuid())
        .bind(launch_code.session_id.into_uuid())
        .bind(launch_code.created_at)
        .bind(launch_code.expires_at)
        .bind(launch_code.used_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(RewardsError::TokenCollision);
        }
        Ok(())
    }

    async fn consume_launch_code(&mut self, code: &str, now: DateTime<Utc>) -> RewardsResult<LaunchCode> {
        let sql = format!(
            r#"
            UPDATE launch_codes
            SET used_at = $2
            WHERE code = $1 AND used_at IS NULL AND expires_at > $2
            RETURNING {LAUNCH_CODE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, LaunchCodeRow>(&sql)
            .bind(code)
            .bind(now)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(row.into_launch_code()),
            None => {
                let sql = format!("SELECT {LAUNCH_CODE_COLUMNS} FROM launch_codes WHERE code = $1");
                let existing = sqlx::query_as::<_, LaunchCodeRow>(&sql)
                    .bind(code)
                    .fetch_optional(&mut *self.tx)
                    .await?
                    .map(LaunchCodeRow::into_launch_code);
                Err(Self::rejection(existing, now))
            }
        }
    }

    async fn insert_redeem_token(&mut self, redeem_token: &RedeemToken) -> RewardsResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO redeem_tokens (id, token, user_id, item_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(redeem_token.id)
        .bind(&redeem_token.token)
        .bind(redeem_token.user_id.into_uuid())
        .bind(redeem_token.item_id.into_uuid())
        .bind(redeem_token.created_at)
        .bind(redeem_token.expires_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(RewardsError::TokenCollision);
        }
        Ok(())
    }

    async fn take_redeem_token(&mut self, token: &str) -> RewardsResult<Option<RedeemToken>> {
        let sql = format!("DELETE FROM redeem_tokens WHERE token = $1 RETURNING {REDEEM_TOKEN_COLUMNS}");
        let row = sqlx::query_as::<_, RedeemTokenRow>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(RedeemTokenRow::into_redeem_token))
    }

    async fn find_inventory_item(&mut self, item_id: InventoryItemId) -> RewardsResult<Option<InventoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(ItemRow::into_item)
            .transpose()
    }

    async fn insert_inventory_item(&mut self, item: &InventoryItem) -> RewardsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, prize_id, user_id, status, created_at, redeemed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id.into_uuid())
        .bind(item.prize_id.into_uuid())
        .bind(item.user_id.into_uuid())
        .bind(item.status.code())
        .bind(item.created_at)
        .bind(item.redeemed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn mark_item_redeemed(
        &mut self,
        item_id: InventoryItemId,
        now: DateTime<Utc>,
    ) -> RewardsResult<bool> {
        let updated = sqlx::query(
            "UPDATE inventory_items SET status = $2, redeemed_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(item_id.into_uuid())
        .bind(ItemStatus::Redeemed.code())
        .bind(now)
        .bind(ItemStatus::Available.code())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn find_prize(&mut self, prize_id: PrizeId) -> RewardsResult<Option<Prize>> {
        let sql = format!("SELECT {PRIZE_COLUMNS} FROM prizes WHERE id = $1");
        sqlx::query_as::<_, PrizeRow>(&sql)
            .bind(prize_id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(PrizeRow::into_prize)
            .transpose()
    }

    async fn list_drawable_prizes(&mut self) -> RewardsResult<Vec<Prize>> {
        let sql = format!(
            "SELECT {PRIZE_COLUMNS} FROM prizes WHERE is_active AND (stock IS NULL OR stock > 0) ORDER BY name"
        );
        sqlx::query_as::<_, PrizeRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(PrizeRow::into_prize)
            .collect()
    }

    async fn take_prize_stock(&mut self, prize_id: PrizeId) -> RewardsResult<bool> {
        let updated = sqlx::query(
            "UPDATE prizes SET stock = stock - 1 WHERE id = $1 AND (stock IS NULL OR stock > 0)",
        )
        .bind(prize_id.into_uuid())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn insert_game_session(&mut self, session: &GameSession) -> RewardsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO game_sessions (id, user_id, game_id, energy_cost, score, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id.into_uuid())
        .bind(session.user_id.into_uuid())
        .bind(&session.game_id)
        .bind(session.energy_cost)
        .bind(session.score)
        .bind(session.created_at)
        .bind(session.completed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_game_session(&mut self, session_id: GameSessionId) -> RewardsResult<Option<GameSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM game_sessions WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session_id.into_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn complete_game_session(
        &mut self,
        session_id: GameSessionId,
        score: i64,
        now: DateTime<Utc>,
    ) -> RewardsResult<bool> {
        let updated = sqlx::query(
            "UPDATE game_sessions SET score = $2, completed_at = $3 WHERE id = $1 AND completed_at IS NULL",
        )
        .bind(session_id.into_uuid())
        .bind(score)
        .bind(now)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn commit(self) -> RewardsResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    avatar_url: Option<String>,
    role: i16,
    amount: i64,
    energy: i32,
    energy_updated_at: Option<DateTime<Utc>>,
    score: i64,
    team_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> RewardsResult<User> {
        let role = UserRole::from_id(self.role)
            .ok_or_else(|| RewardsError::Internal(format!("unknown role id {}", self.role)))?;

        Ok(User {
            id: UserId::from_uuid(self.id),
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            role,
            amount: self.amount,
            energy: self.energy,
            energy_updated_at: self.energy_updated_at,
            score: self.score,
            team_id: self.team_id.map(TeamId::from_uuid),
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    score: i64,
    max_score: i64,
}

impl TeamRow {
    fn into_team(self) -> Team {
        Team {
            id: TeamId::from_uuid(self.id),
            name: self.name,
            score: self.score,
            max_score: self.max_score,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RefreshRow {
    id: Uuid,
    token_hash: String,
    user_id: Uuid,
    session_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    blacklisted: bool,
}

impl RefreshRow {
    fn into_credential(self) -> RefreshCredential {
        RefreshCredential {
            id: self.id,
            token_hash: self.token_hash,
            user_id: UserId::from_uuid(self.user_id),
            session_id: self.session_id.map(GameSessionId::from_uuid),
            created_at: self.created_at,
            expires_at: self.expires_at,
            blacklisted: self.blacklisted,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LaunchCodeRow {
    id: Uuid,
    code: String,
    user_id: Uuid,
    session_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl LaunchCodeRow {
    fn into_launch_code(self) -> LaunchCode {
        LaunchCode {
            id: self.id,
            code: self.code,
            user_id: UserId::from_uuid(self.user_id),
            session_id: GameSessionId::from_uuid(self.session_id),
            created_at: self.created_at,
            expires_at: self.expires_at,
            used_at: self.used_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RedeemTokenRow {
    id: Uuid,
    token: String,
    user_id: Uuid,
    item_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl RedeemTokenRow {
    fn into_redeem_token(self) -> RedeemToken {
        RedeemToken {
            id: self.id,
            token: self.token,
            user_id: UserId::from_uuid(self.user_id),
            item_id: InventoryItemId::from_uuid(self.item_id),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    prize_id: Uuid,
    user_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    redeemed_at: Option<DateTime<Utc>>,
}

impl ItemRow {
    fn into_item(self) -> RewardsResult<InventoryItem> {
        let status = ItemStatus::from_code(&self.status)
            .ok_or_else(|| RewardsError::Internal(format!("unknown item status {}", self.status)))?;

        Ok(InventoryItem {
            id: InventoryItemId::from_uuid(self.id),
            prize_id: PrizeId::from_uuid(self.prize_id),
            user_id: UserId::from_uuid(self.user_id),
            status,
            created_at: self.created_at,
            redeemed_at: self.redeemed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PrizeRow {
    id: Uuid,
    name: String,
    prize_type: String,
    amount: i64,
    rarity: i16,
    stock: Option<i32>,
    emoji: Option<String>,
    is_active: bool,
}

impl PrizeRow {
    fn into_prize(self) -> RewardsResult<Prize> {
        let prize_type = PrizeType::from_code(&self.prize_type)
            .ok_or_else(|| RewardsError::Internal(format!("unknown prize type {}", self.prize_type)))?;
        let rarity = RarityTier::from_id(self.rarity)
            .ok_or_else(|| RewardsError::Internal(format!("unknown rarity {}", self.rarity)))?;

        Ok(Prize {
            id: PrizeId::from_uuid(self.id),
            name: self.name,
            prize_type,
            amount: self.amount,
            rarity,
            stock: self.stock,
            emoji: self.emoji,
            is_active: self.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    game_id: String,
    energy_cost: i32,
    score: Option<i64>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn into_session(self) -> GameSession {
        GameSession {
            id: GameSessionId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            game_id: self.game_id,
            energy_cost: self.energy_cost,
            score: self.score,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}
