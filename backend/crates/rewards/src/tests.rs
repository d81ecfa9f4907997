//! Unit tests for the rewards crate

#[cfg(test)]
mod support {
    use chrono::{TimeDelta, Utc};
    use kernel::clock::{Clock, ManualClock};
    use platform::jwt::JwtKeys;
    use std::sync::Arc;

    use crate::application::config::RewardsConfig;
    use crate::application::launch_game::LaunchGameUseCase;
    use crate::application::maintenance::CleanupExpiredUseCase;
    use crate::application::profile::ProfileUseCase;
    use crate::application::redeem_prize::RedeemPrizeUseCase;
    use crate::application::refresh_session::RefreshSessionUseCase;
    use crate::application::spin_wheel::SpinWheelUseCase;
    use crate::application::submit_score::SubmitScoreUseCase;
    use crate::domain::entities::{InventoryItem, Prize, User};
    use crate::domain::repository::{RewardsStore, RewardsTx};
    use crate::domain::value_objects::UserRole;
    use crate::infra::memory::MemoryRewardsStore;

    pub struct Harness {
        pub store: Arc<MemoryRewardsStore>,
        pub keys: Arc<JwtKeys>,
        pub config: Arc<RewardsConfig>,
        pub clock: Arc<ManualClock>,
    }

    impl Harness {
        pub fn new() -> Self {
            let config = RewardsConfig::development();
            Self {
                store: Arc::new(MemoryRewardsStore::new()),
                keys: Arc::new(JwtKeys::from_secret(&config.access_token_secret)),
                config: Arc::new(config),
                clock: Arc::new(ManualClock::new(Utc::now())),
            }
        }

        pub fn clock(&self) -> Arc<dyn Clock> {
            self.clock.clone()
        }

        pub fn advance_secs(&self, secs: i64) {
            self.clock.advance(TimeDelta::seconds(secs));
        }

        pub fn refresh(&self) -> RefreshSessionUseCase<MemoryRewardsStore> {
            RefreshSessionUseCase::new(
                self.store.clone(),
                self.keys.clone(),
                self.config.clone(),
                self.clock(),
            )
        }

        pub fn launcher(&self) -> LaunchGameUseCase<MemoryRewardsStore> {
            LaunchGameUseCase::new(
                self.store.clone(),
                self.keys.clone(),
                self.config.clone(),
                self.clock(),
            )
        }

        pub fn redeemer(&self) -> RedeemPrizeUseCase<MemoryRewardsStore> {
            RedeemPrizeUseCase::new(self.store.clone(), self.config.clone(), self.clock())
        }

        pub fn wheel(&self) -> SpinWheelUseCase<MemoryRewardsStore> {
            SpinWheelUseCase::new(self.store.clone(), self.config.clone(), self.clock())
        }

        pub fn scores(&self) -> SubmitScoreUseCase<MemoryRewardsStore> {
            SubmitScoreUseCase::new(self.store.clone(), self.clock())
        }

        pub fn profile(&self) -> ProfileUseCase<MemoryRewardsStore> {
            ProfileUseCase::new(self.store.clone(), self.config.clone(), self.clock())
        }

        pub fn cleanup(&self) -> CleanupExpiredUseCase<MemoryRewardsStore> {
            CleanupExpiredUseCase::new(self.store.clone(), self.clock())
        }

        /// Player with full energy and the given balance.
        pub async fn player(&self, amount: i64) -> User {
            let mut user = User::new(
                "Player",
                UserRole::User,
                self.config.energy_max,
                self.clock.now(),
            );
            user.amount = amount;
            self.store.insert_user(user.clone()).await;
            user
        }

        pub async fn admin(&self) -> User {
            let user = User::new("Staff", UserRole::Admin, 0, self.clock.now());
            self.store.insert_user(user.clone()).await;
            user
        }

        pub async fn prize(&self, prize: Prize) -> Prize {
            self.store.insert_prize(prize.clone()).await;
            prize
        }

        /// Inventory item owned by `user`, bypassing the wheel.
        pub async fn grant(&self, user: &User, prize: &Prize) -> InventoryItem {
            let item = InventoryItem::new(prize.id, user.id, self.clock.now());
            let mut tx = self.store.begin().await.unwrap();
            tx.insert_inventory_item(&item).await.unwrap();
            tx.commit().await.unwrap();
            item
        }
    }
}

#[cfg(test)]
mod config_tests {
    use crate::application::config::{MAX_TTL, RewardsConfig};
    use crate::domain::entities::RefreshCredential;
    use crate::domain::services::prize_selector::WeightingPolicy;
    use chrono::{TimeDelta, Utc};
    use kernel::id::UserId;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = RewardsConfig::default();
        assert_eq!(config.access_token_ttl.as_secs(), 15 * 60);
        assert_eq!(config.refresh_token_ttl.as_secs(), 30 * 24 * 3600);
        assert_eq!(config.launch_code_ttl.as_secs(), 120);
        assert_eq!(config.redeem_token_ttl.as_secs(), 300);
        assert_eq!(config.energy_max, 10);
        assert_eq!(config.energy_refill_secs(), 300);
        assert_eq!(config.prize_weighting, WeightingPolicy::Rarity);
        assert!(config.cookie_secure);
    }

    #[test]
    fn test_development_config() {
        let config = RewardsConfig::development();
        assert_eq!(config.access_token_secret.len(), 32);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn test_launch_url_puts_code_in_fragment() {
        let config = RewardsConfig {
            game_url: "https://play.example/game".to_string(),
            ..RewardsConfig::default()
        };
        assert_eq!(
            config.launch_url("s1", "abc"),
            "https://play.example/game?sid=s1#code=abc"
        );
    }

    #[test]
    fn test_refresh_cookie_matches_credential_lifetime() {
        let cookie = RewardsConfig::development()
            .refresh_cookie()
            .build_set_cookie("tok");
        assert!(cookie.starts_with("refresh_token=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/auth"));
        assert!(cookie.contains(&format!("Max-Age={}", 30 * 24 * 3600)));
    }

    #[test]
    fn test_oversized_ttls_are_clamped() {
        let config = RewardsConfig {
            access_token_ttl: Duration::MAX,
            refresh_token_ttl: Duration::from_secs(u64::MAX / 2),
            energy_refill_interval: Duration::MAX,
            ..RewardsConfig::development()
        };
        let max = TimeDelta::from_std(MAX_TTL).unwrap();
        assert_eq!(config.access_token_ttl_delta(), max);
        assert_eq!(config.refresh_token_ttl_delta(), max);
        assert_eq!(config.energy_refill_secs(), MAX_TTL.as_secs() as i64);

        // Entity constructors add the TTL to the current time
        let now = Utc::now();
        let credential = RefreshCredential::new(
            "digest".to_string(),
            UserId::new(),
            None,
            now,
            config.refresh_token_ttl_delta(),
        );
        assert_eq!(credential.expires_at, now + max);
    }
}

#[cfg(test)]
mod error_tests {
    use crate::error::RewardsError;
    use kernel::error::app_error::AppError;
    use kernel::error::kind::ErrorKind;

    #[test]
    fn test_status_codes() {
        assert_eq!(RewardsError::NotFound.status_code().as_u16(), 404);
        assert_eq!(RewardsError::Unauthorized.status_code().as_u16(), 401);
        assert_eq!(RewardsError::Forbidden.status_code().as_u16(), 403);
        assert_eq!(RewardsError::Gone.status_code().as_u16(), 410);
        assert_eq!(RewardsError::InsufficientFunds.status_code().as_u16(), 402);
        assert_eq!(RewardsError::InsufficientEnergy.status_code().as_u16(), 400);
        assert_eq!(RewardsError::SessionCompleted.status_code().as_u16(), 409);
        assert_eq!(RewardsError::NoPrizesConfigured.status_code().as_u16(), 500);
        assert_eq!(RewardsError::TokenCollision.status_code().as_u16(), 500);
    }

    #[test]
    fn test_client_error_keeps_message_and_code() {
        let err: AppError = RewardsError::InvalidInput("bet must not be negative".into()).into();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.message().contains("bet must not be negative"));
        assert_eq!(err.code(), Some("invalid_input"));
    }

    #[test]
    fn test_server_error_hides_details() {
        let err: AppError = RewardsError::Internal("prize 42 missing".into()).into();
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
        assert!(!err.message().contains("prize 42"));
        assert_eq!(err.code(), Some("internal_error"));
    }
}

#[cfg(test)]
mod refresh_tests {
    use super::support::Harness;
    use crate::application::issuance::refresh_token_hash;
    use crate::error::RewardsError;

    #[tokio::test]
    async fn test_rotation_invalidates_previous_token() {
        let h = Harness::new();
        let user = h.player(0).await;
        let refresh = h.refresh();

        let first = refresh.issue_pair(user.id).await.unwrap();
        let second = refresh.rotate(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let reused = refresh.rotate(&first.refresh_token).await;
        assert!(matches!(reused, Err(RewardsError::Unauthorized)));

        let old = h
            .store
            .refresh_credential(&refresh_token_hash(&first.refresh_token))
            .await
            .unwrap();
        assert!(old.blacklisted);

        // The replacement is still live
        assert!(refresh.rotate(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_stored_as_digest() {
        let h = Harness::new();
        let user = h.player(0).await;
        let pair = h.refresh().issue_pair(user.id).await.unwrap();

        assert!(h.store.refresh_credential(&pair.refresh_token).await.is_none());
        let stored = h
            .store
            .refresh_credential(&refresh_token_hash(&pair.refresh_token))
            .await
            .unwrap();
        assert_eq!(stored.user_id, user.id);
        assert_eq!(stored.session_id, None);
        assert_eq!(stored.token_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_rejected() {
        let h = Harness::new();
        let user = h.player(0).await;
        let refresh = h.refresh();
        let pair = refresh.issue_pair(user.id).await.unwrap();

        h.advance_secs(30 * 24 * 3600);
        let result = refresh.rotate(&pair.refresh_token).await;
        assert!(matches!(result, Err(RewardsError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_unknown_refresh_token_rejected() {
        let h = Harness::new();
        let result = h.refresh().rotate("not-a-token").await;
        assert!(matches!(result, Err(RewardsError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let h = Harness::new();
        let user = h.player(0).await;
        let refresh = h.refresh();
        let pair = refresh.issue_pair(user.id).await.unwrap();

        refresh.revoke(&pair.refresh_token).await.unwrap();
        refresh.revoke(&pair.refresh_token).await.unwrap();
        refresh.revoke("never-issued").await.unwrap();

        let result = refresh.rotate(&pair.refresh_token).await;
        assert!(matches!(result, Err(RewardsError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_access_token_expires_on_injected_clock() {
        let h = Harness::new();
        let user = h.player(0).await;
        let refresh = h.refresh();
        let pair = refresh.issue_pair(user.id).await.unwrap();
        assert_eq!(pair.access_expires_in, 15 * 60);

        let claims = refresh.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user.id.into_uuid());
        assert_eq!(claims.role, "user");
        assert!(claims.sid.is_none());

        h.advance_secs(15 * 60);
        assert!(matches!(
            refresh.verify_access(&pair.access_token),
            Err(RewardsError::Unauthorized)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_has_one_winner() {
        let h = Harness::new();
        let user = h.player(0).await;
        let pair = h.refresh().issue_pair(user.id).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let refresh = h.refresh();
            let token = pair.refresh_token.clone();
            tasks.spawn(async move { refresh.rotate(&token).await });
        }

        let mut winners = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(matches!(e, RewardsError::Unauthorized)),
            }
        }
        assert_eq!(winners, 1);
    }
}

#[cfg(test)]
mod launch_tests {
    use super::support::Harness;
    use crate::application::issuance::refresh_token_hash;
    use crate::domain::repository::{RewardsStore, RewardsTx};
    use crate::error::RewardsError;
    use chrono::TimeDelta;
    use kernel::clock::Clock;

    #[tokio::test]
    async fn test_launch_spends_energy_and_opens_session() {
        let h = Harness::new();
        let user = h.player(0).await;

        let output = h.launcher().launch(user.id, "tetris").await.unwrap();
        assert_eq!(output.energy.current, 9);
        assert_eq!(output.energy.max, 10);
        assert!(output.launch_url.contains(&format!("?sid={}", output.session_id)));
        assert!(output.launch_url.ends_with(&format!("#code={}", output.launch_code)));

        let session = h.store.game_session(output.session_id).await.unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.game_id, "tetris");
        assert!(!session.is_completed());

        let code = h.store.launch_code(&output.launch_code).await.unwrap();
        assert_eq!(code.session_id, output.session_id);
        assert_eq!(code.expires_at - code.created_at, TimeDelta::seconds(120));
        assert_eq!(h.store.user(user.id).await.unwrap().energy, 9);
    }

    #[tokio::test]
    async fn test_launch_keeps_partial_refill() {
        let h = Harness::new();
        let mut user = h.player(0).await;
        user.energy = 7;
        user.energy_updated_at = Some(h.clock.now() - TimeDelta::seconds(610));
        h.store.insert_user(user.clone()).await;

        let output = h.launcher().launch(user.id, "snake").await.unwrap();
        assert_eq!(output.energy.current, 8);
        assert_eq!(output.energy.next_refill_in_seconds, 290);
    }

    #[tokio::test]
    async fn test_launch_without_energy() {
        let h = Harness::new();
        let mut user = h.player(0).await;
        user.energy = 0;
        h.store.insert_user(user.clone()).await;

        let result = h.launcher().launch(user.id, "tetris").await;
        assert!(matches!(result, Err(RewardsError::InsufficientEnergy)));
        assert_eq!(h.store.user(user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_launch_rejects_blank_game_id() {
        let h = Harness::new();
        let user = h.player(0).await;
        let result = h.launcher().launch(user.id, "  ").await;
        assert!(matches!(result, Err(RewardsError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_exchange_issues_session_scoped_tokens() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launcher = h.launcher();
        let output = launcher.launch(user.id, "tetris").await.unwrap();

        let exchanged = launcher.exchange(&output.launch_code).await.unwrap();
        assert_eq!(exchanged.user_id, user.id);
        assert_eq!(exchanged.session_id, output.session_id);

        let claims = h.refresh().verify_access(&exchanged.tokens.access_token).unwrap();
        assert_eq!(claims.sid, Some(output.session_id.into_uuid()));
    }

    #[tokio::test]
    async fn test_session_scope_survives_rotation() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launcher = h.launcher();
        let output = launcher.launch(user.id, "tetris").await.unwrap();
        let exchanged = launcher.exchange(&output.launch_code).await.unwrap();

        let refresh = h.refresh();
        let first = refresh.rotate(&exchanged.tokens.refresh_token).await.unwrap();
        let second = refresh.rotate(&first.refresh_token).await.unwrap();

        for pair in [&first, &second] {
            let claims = refresh.verify_access(&pair.access_token).unwrap();
            assert_eq!(claims.sid, Some(output.session_id.into_uuid()));
        }
        let stored = h
            .store
            .refresh_credential(&refresh_token_hash(&second.refresh_token))
            .await
            .unwrap();
        assert_eq!(stored.session_id, Some(output.session_id));
    }

    #[tokio::test]
    async fn test_second_exchange_is_unauthorized() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launcher = h.launcher();
        let output = launcher.launch(user.id, "tetris").await.unwrap();

        launcher.exchange(&output.launch_code).await.unwrap();
        let second = launcher.exchange(&output.launch_code).await;
        assert!(matches!(second, Err(RewardsError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_expired_launch_code_is_unauthorized() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launcher = h.launcher();
        let output = launcher.launch(user.id, "tetris").await.unwrap();

        h.advance_secs(120);
        let result = launcher.exchange(&output.launch_code).await;
        assert!(matches!(result, Err(RewardsError::Unauthorized)));
        assert!(h.store.launch_code(&output.launch_code).await.unwrap().used_at.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exchange_has_one_winner() {
        let h = Harness::new();
        let user = h.player(0).await;
        let output = h.launcher().launch(user.id, "tetris").await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let launcher = h.launcher();
            let code = output.launch_code.clone();
            tasks.spawn(async move { launcher.exchange(&code).await });
        }

        let mut winners = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(matches!(e, RewardsError::Unauthorized)),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_reissue_code_for_open_session() {
        let h = Harness::new();
        let user = h.player(0).await;
        let stranger = h.player(0).await;
        let launcher = h.launcher();
        let output = launcher.launch(user.id, "tetris").await.unwrap();

        let issued = launcher.issue_code(user.id, output.session_id).await.unwrap();
        assert_ne!(issued.launch_code, output.launch_code);
        assert!(launcher.exchange(&issued.launch_code).await.is_ok());

        let foreign = launcher.issue_code(stranger.id, output.session_id).await;
        assert!(matches!(foreign, Err(RewardsError::NotFound)));

        let mut tx = h.store.begin().await.unwrap();
        assert!(tx
            .complete_game_session(output.session_id, 10, h.clock.now())
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let closed = launcher.issue_code(user.id, output.session_id).await;
        assert!(matches!(closed, Err(RewardsError::SessionCompleted)));
    }
}

#[cfg(test)]
mod redeem_tests {
    use super::support::Harness;
    use crate::domain::entities::Prize;
    use crate::domain::value_objects::{ItemStatus, PrizeType, RarityTier};
    use crate::error::RewardsError;

    fn plush() -> Prize {
        Prize::new("Plush", PrizeType::Item, 0, RarityTier::Rare, None)
    }

    #[tokio::test]
    async fn test_redeem_flow() {
        let h = Harness::new();
        let user = h.player(0).await;
        let prize = h.prize(plush()).await;
        let item = h.grant(&user, &prize).await;
        let redeemer = h.redeemer();

        let issued = redeemer.issue_token(user.id, item.id).await.unwrap();
        assert_eq!(issued.token.len(), 10);
        assert!(issued.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(issued.expires_in_seconds, 300);

        let record = redeemer.redeem(&issued.token).await.unwrap();
        assert_eq!(record.item_id, item.id);
        assert_eq!(record.item_name, "Plush");
        assert_eq!(record.user_display_name, "Player");

        let stored = h.store.inventory_item(item.id).await.unwrap();
        assert_eq!(stored.status, ItemStatus::Redeemed);
        assert_eq!(h.store.redeem_token_count().await, 0);

        let again = redeemer.redeem(&issued.token).await;
        assert!(matches!(again, Err(RewardsError::NotFound)));
    }

    #[tokio::test]
    async fn test_issue_token_checks_ownership_and_status() {
        let h = Harness::new();
        let owner = h.player(0).await;
        let other = h.player(0).await;
        let prize = h.prize(plush()).await;
        let item = h.grant(&owner, &prize).await;
        let redeemer = h.redeemer();

        let foreign = redeemer.issue_token(other.id, item.id).await;
        assert!(matches!(foreign, Err(RewardsError::Forbidden)));

        let missing = redeemer
            .issue_token(owner.id, kernel::id::InventoryItemId::new())
            .await;
        assert!(matches!(missing, Err(RewardsError::NotFound)));

        let issued = redeemer.issue_token(owner.id, item.id).await.unwrap();
        redeemer.redeem(&issued.token).await.unwrap();

        let redeemed = redeemer.issue_token(owner.id, item.id).await;
        assert!(matches!(redeemed, Err(RewardsError::NotFound)));
    }

    #[tokio::test]
    async fn test_expired_token_is_gone_and_deleted() {
        let h = Harness::new();
        let user = h.player(0).await;
        let prize = h.prize(plush()).await;
        let item = h.grant(&user, &prize).await;
        let redeemer = h.redeemer();

        let issued = redeemer.issue_token(user.id, item.id).await.unwrap();
        h.advance_secs(300);

        let expired = redeemer.redeem(&issued.token).await;
        assert!(matches!(expired, Err(RewardsError::Gone)));
        assert_eq!(h.store.redeem_token_count().await, 0);
        assert!(h.store.inventory_item(item.id).await.unwrap().is_available());

        let again = redeemer.redeem(&issued.token).await;
        assert!(matches!(again, Err(RewardsError::NotFound)));
    }

    #[tokio::test]
    async fn test_second_token_for_redeemed_item_is_gone() {
        let h = Harness::new();
        let user = h.player(0).await;
        let prize = h.prize(plush()).await;
        let item = h.grant(&user, &prize).await;
        let redeemer = h.redeemer();

        let first = redeemer.issue_token(user.id, item.id).await.unwrap();
        let second = redeemer.issue_token(user.id, item.id).await.unwrap();

        redeemer.redeem(&first.token).await.unwrap();
        let result = redeemer.redeem(&second.token).await;
        assert!(matches!(result, Err(RewardsError::Gone)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeem_has_one_winner() {
        let h = Harness::new();
        let user = h.player(0).await;
        let prize = h.prize(plush()).await;
        let item = h.grant(&user, &prize).await;
        let issued = h.redeemer().issue_token(user.id, item.id).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..2 {
            let redeemer = h.redeemer();
            let token = issued.token.clone();
            tasks.spawn(async move { redeemer.redeem(&token).await });
        }

        let mut records = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(record) => records.push(record),
                Err(e) => assert!(matches!(e, RewardsError::Gone | RewardsError::NotFound)),
            }
        }
        assert_eq!(records.len(), 1);
        assert_eq!(
            h.store.inventory_item(item.id).await.unwrap().status,
            ItemStatus::Redeemed
        );
    }
}

#[cfg(test)]
mod spin_tests {
    use super::support::Harness;
    use crate::domain::entities::Prize;
    use crate::domain::services::prize_selector::{WeightingPolicy, select_index};
    use crate::domain::value_objects::{ItemStatus, PrizeType, RarityTier};
    use crate::error::RewardsError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[tokio::test]
    async fn test_insufficient_funds_mutates_nothing() {
        let h = Harness::new();
        let user = h.player(50).await;
        let prize = h
            .prize(Prize::new("Sticker", PrizeType::Item, 0, RarityTier::Common, Some(3)))
            .await;

        let result = h.wheel().spin(user.id, 100).await;
        assert!(matches!(result, Err(RewardsError::InsufficientFunds)));

        assert_eq!(h.store.user(user.id).await.unwrap(), user);
        assert_eq!(h.store.prize(prize.id).await.unwrap().stock, Some(3));
        assert!(h.store.inventory_of(user.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_negative_bet_rejected() {
        let h = Harness::new();
        let user = h.player(50).await;
        let result = h.wheel().spin(user.id, -1).await;
        assert!(matches!(result, Err(RewardsError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_money_prize_pays_out() {
        let h = Harness::new();
        let user = h.player(100).await;
        h.prize(Prize::new("Coins", PrizeType::Money, 30, RarityTier::Common, None))
            .await;

        let outcome = h.wheel().spin(user.id, 10).await.unwrap();
        assert_eq!(outcome.prize.name, "Coins");
        assert_eq!(outcome.balance, 120);
        assert!(outcome.inventory_item_id.is_none());
        assert_eq!(h.store.user(user.id).await.unwrap().amount, 120);
    }

    #[tokio::test]
    async fn test_trash_prize_only_costs_the_bet() {
        let h = Harness::new();
        let user = h.player(100).await;
        h.prize(Prize::new("Nothing", PrizeType::Trash, 0, RarityTier::Common, None))
            .await;

        let outcome = h.wheel().spin(user.id, 25).await.unwrap();
        assert_eq!(outcome.balance, 75);
        assert!(h.store.inventory_of(user.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_item_prize_consumes_stock() {
        let h = Harness::new();
        let user = h.player(100).await;
        let prize = h
            .prize(Prize::new("Keychain", PrizeType::Item, 0, RarityTier::Epic, Some(1)))
            .await;
        let wheel = h.wheel();

        let outcome = wheel.spin(user.id, 0).await.unwrap();
        let item_id = outcome.inventory_item_id.unwrap();
        let item = h.store.inventory_item(item_id).await.unwrap();
        assert_eq!(item.prize_id, prize.id);
        assert_eq!(item.user_id, user.id);
        assert_eq!(item.status, ItemStatus::Available);
        assert_eq!(h.store.prize(prize.id).await.unwrap().stock, Some(0));

        let sold_out = wheel.spin(user.id, 0).await;
        assert!(matches!(sold_out, Err(RewardsError::NoPrizesConfigured)));
        assert_eq!(h.store.user(user.id).await.unwrap().amount, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_spins_never_oversell() {
        const PLAYERS: usize = 8;

        let h = Harness::new();
        let prize = h
            .prize(Prize::new("Plush", PrizeType::Item, 0, RarityTier::Legendary, Some(1)))
            .await;
        let mut players = Vec::new();
        for _ in 0..PLAYERS {
            players.push(h.player(100).await);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for player in &players {
            let wheel = h.wheel();
            let user_id = player.id;
            tasks.spawn(async move { (user_id, wheel.spin(user_id, 10).await) });
        }

        let mut winners = Vec::new();
        let mut sold_out = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                (user_id, Ok(outcome)) => winners.push((user_id, outcome)),
                (user_id, Err(RewardsError::NoPrizesConfigured)) => sold_out.push(user_id),
                (_, Err(e)) => panic!("unexpected spin error: {e:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(sold_out.len(), PLAYERS - 1);
        assert_eq!(h.store.prize(prize.id).await.unwrap().stock, Some(0));

        let (winner_id, outcome) = &winners[0];
        let item_id = outcome.inventory_item_id.unwrap();
        assert_eq!(h.store.inventory_item(item_id).await.unwrap().user_id, *winner_id);
        assert_eq!(h.store.user(*winner_id).await.unwrap().amount, 90);

        for user_id in sold_out {
            assert_eq!(h.store.user(user_id).await.unwrap().amount, 100);
            assert!(h.store.inventory_of(user_id).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let h = Harness::new();
        let user = h.player(100).await;
        let result = h.wheel().spin(user.id, 10).await;
        assert!(matches!(result, Err(RewardsError::NoPrizesConfigured)));
    }

    #[test]
    fn test_rarity_distribution_over_many_draws() {
        let prizes = [
            Prize::new("c", PrizeType::Trash, 0, RarityTier::Common, None),
            Prize::new("r", PrizeType::Trash, 0, RarityTier::Rare, None),
            Prize::new("e", PrizeType::Trash, 0, RarityTier::Epic, None),
            Prize::new("l", PrizeType::Trash, 0, RarityTier::Legendary, None),
        ];
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u32; 4];

        const DRAWS: u32 = 100_000;
        for _ in 0..DRAWS {
            let index = select_index(&prizes, WeightingPolicy::Rarity, &mut rng).unwrap();
            counts[index] += 1;
        }

        for (prize, count) in prizes.iter().zip(counts) {
            let share = f64::from(count) * 100.0 / f64::from(DRAWS);
            let expected = prize.rarity.percent() as f64;
            assert!(
                (share - expected).abs() < 2.0,
                "{:?}: {share:.2}% vs {expected}%",
                prize.rarity
            );
        }
    }
}

#[cfg(test)]
mod score_tests {
    use super::support::Harness;
    use crate::domain::entities::Team;
    use crate::error::RewardsError;

    #[tokio::test]
    async fn test_score_credits_user_and_team() {
        let h = Harness::new();
        let team = Team::new("Red");
        h.store.insert_team(team.clone()).await;
        let mut user = h.player(0).await;
        user.team_id = Some(team.id);
        h.store.insert_user(user.clone()).await;

        let launcher = h.launcher();
        let scores = h.scores();

        let first = launcher.launch(user.id, "tetris").await.unwrap();
        let outcome = scores.submit(user.id, first.session_id, 120).await.unwrap();
        assert_eq!(outcome.user_score, 120);
        assert_eq!(outcome.team_score, Some(120));

        let second = launcher.launch(user.id, "tetris").await.unwrap();
        scores.submit(user.id, second.session_id, 80).await.unwrap();

        let team = h.store.team(team.id).await.unwrap();
        assert_eq!(team.score, 200);
        assert_eq!(team.max_score, 120);
        assert_eq!(h.store.user(user.id).await.unwrap().score, 200);

        let session = h.store.game_session(first.session_id).await.unwrap();
        assert_eq!(session.score, Some(120));
        assert!(session.is_completed());
    }

    #[tokio::test]
    async fn test_score_without_team() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launched = h.launcher().launch(user.id, "tetris").await.unwrap();

        let outcome = h.scores().submit(user.id, launched.session_id, 5).await.unwrap();
        assert_eq!(outcome.team_score, None);
    }

    #[tokio::test]
    async fn test_session_scores_once() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launched = h.launcher().launch(user.id, "tetris").await.unwrap();
        let scores = h.scores();

        scores.submit(user.id, launched.session_id, 10).await.unwrap();
        let again = scores.submit(user.id, launched.session_id, 10).await;
        assert!(matches!(again, Err(RewardsError::SessionCompleted)));
        assert_eq!(h.store.user(user.id).await.unwrap().score, 10);
    }

    #[tokio::test]
    async fn test_foreign_session_not_found() {
        let h = Harness::new();
        let owner = h.player(0).await;
        let other = h.player(0).await;
        let launched = h.launcher().launch(owner.id, "tetris").await.unwrap();

        let result = h.scores().submit(other.id, launched.session_id, 10).await;
        assert!(matches!(result, Err(RewardsError::NotFound)));
    }

    #[tokio::test]
    async fn test_negative_score_rejected() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launched = h.launcher().launch(user.id, "tetris").await.unwrap();

        let result = h.scores().submit(user.id, launched.session_id, -5).await;
        assert!(matches!(result, Err(RewardsError::InvalidInput(_))));
    }
}

#[cfg(test)]
mod profile_tests {
    use super::support::Harness;
    use crate::domain::value_objects::ProfilePatch;
    use crate::error::RewardsError;

    #[tokio::test]
    async fn test_energy_status_is_read_only() {
        let h = Harness::new();
        let mut user = h.player(0).await;
        user.energy = 2;
        h.store.insert_user(user.clone()).await;

        h.advance_secs(650);
        let status = h.profile().energy_status(user.id).await.unwrap();
        assert_eq!(status.current, 4);
        assert_eq!(status.max, 10);
        assert_eq!(status.next_refill_in_seconds, 250);

        // Reading twice yields the same answer and stores nothing
        assert_eq!(h.profile().energy_status(user.id).await.unwrap(), status);
        assert_eq!(h.store.user(user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_patch_profile() {
        let h = Harness::new();
        let user = h.player(500).await;

        let patch: ProfilePatch =
            serde_json::from_str(r#"{"displayName":"  Neo  ","avatarUrl":"https://a/b.png"}"#)
                .unwrap();
        let updated = h.profile().patch_profile(user.id, patch).await.unwrap();
        assert_eq!(updated.display_name, "Neo");
        assert_eq!(updated.avatar_url.as_deref(), Some("https://a/b.png"));
        assert_eq!(updated.amount, 500);

        let cleared: ProfilePatch = serde_json::from_str(r#"{"avatarUrl":""}"#).unwrap();
        let updated = h.profile().patch_profile(user.id, cleared).await.unwrap();
        assert_eq!(updated.avatar_url, None);
        assert_eq!(updated.display_name, "Neo");
    }

    #[test]
    fn test_patch_cannot_carry_balance() {
        let result = serde_json::from_str::<ProfilePatch>(r#"{"amount":1000000}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_patch_rejected() {
        let h = Harness::new();
        let user = h.player(0).await;
        let result = h.profile().patch_profile(user.id, ProfilePatch::default()).await;
        assert!(matches!(result, Err(RewardsError::InvalidInput(_))));
    }
}

#[cfg(test)]
mod maintenance_tests {
    use super::support::Harness;

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launched = h.launcher().launch(user.id, "tetris").await.unwrap();
        let pair = h.refresh().issue_pair(user.id).await.unwrap();

        let report = h.cleanup().execute().await.unwrap();
        assert_eq!(report.launch_codes, 0);
        assert_eq!(report.refresh_credentials, 0);

        h.advance_secs(121);
        let report = h.cleanup().execute().await.unwrap();
        assert_eq!(report.launch_codes, 1);
        assert_eq!(report.refresh_credentials, 0);
        assert!(h.store.launch_code(&launched.launch_code).await.is_none());

        assert!(h.refresh().rotate(&pair.refresh_token).await.is_ok());
    }
}

#[cfg(test)]
mod http_tests {
    use super::support::Harness;
    use crate::application::config::RewardsConfig;
    use crate::application::issuance::{mint_access_token, refresh_token_hash};
    use crate::domain::entities::User;
    use crate::presentation::dto::CSRF_HEADER;
    use crate::presentation::router::rewards_router_generic;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use kernel::clock::Clock;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router(h: &Harness) -> Router {
        rewards_router_generic(
            (*h.store).clone(),
            RewardsConfig::clone(&h.config),
            h.clock(),
        )
    }

    fn bearer(h: &Harness, user: &User) -> String {
        let token = mint_access_token(&h.keys, user, None, h.clock.now(), &h.config).unwrap();
        format!("Bearer {token}")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_energy_endpoint() {
        let h = Harness::new();
        let user = h.player(0).await;

        let response = router(&h)
            .oneshot(
                Request::builder()
                    .uri("/main/energy")
                    .header(header::AUTHORIZATION, bearer(&h, &user))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["current"], 10);
        assert_eq!(body["max"], 10);
        assert_eq!(body["nextRefillInSeconds"], 0);
    }

    #[tokio::test]
    async fn test_missing_bearer_is_unauthorized() {
        let h = Harness::new();
        let response = router(&h)
            .oneshot(
                Request::builder()
                    .uri("/main/energy")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_redeem_requires_admin() {
        let h = Harness::new();
        let user = h.player(0).await;
        let admin = h.admin().await;

        let request = |auth: String| {
            Request::builder()
                .method("POST")
                .uri("/admin/prizes/redeem")
                .header(header::AUTHORIZATION, auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"token":"UNKNOWN123"}"#))
                .unwrap()
        };

        let response = router(&h).oneshot(request(bearer(&h, &user))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router(&h).oneshot(request(bearer(&h, &admin))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// Every `Set-Cookie` header of a response.
    fn set_cookies(response: &axum::response::Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect()
    }

    fn cookie_value(set_cookies: &[String], name: &str) -> String {
        let prefix = format!("{name}=");
        let cookie = set_cookies.iter().find(|c| c.starts_with(&prefix)).unwrap();
        cookie[prefix.len()..].split(';').next().unwrap().to_string()
    }

    /// Exchanges a fresh launch code; returns (refresh cookie, csrf cookie).
    async fn webview_login(h: &Harness) -> (String, String) {
        let user = h.player(0).await;
        let launched = h.launcher().launch(user.id, "tetris").await.unwrap();

        let response = router(h)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/webview/exchange")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"code":"{}"}}"#, launched.launch_code)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        (
            cookie_value(&cookies, "refresh_token"),
            cookie_value(&cookies, "csrf_token"),
        )
    }

    fn cookie_request(uri: &str, refresh: &str, csrf: &str, echoed: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, format!("refresh_token={refresh}; csrf_token={csrf}"));
        if let Some(echoed) = echoed {
            builder = builder.header(CSRF_HEADER, echoed);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_sets_cookie_used_by_refresh() {
        let h = Harness::new();
        let user = h.player(0).await;
        let launched = h.launcher().launch(user.id, "tetris").await.unwrap();

        let response = router(&h)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/webview/exchange")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"code":"{}"}}"#, launched.launch_code)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        let refresh_cookie = cookies.iter().find(|c| c.starts_with("refresh_token=")).unwrap();
        assert!(refresh_cookie.contains("HttpOnly"));
        let csrf_cookie = cookies.iter().find(|c| c.starts_with("csrf_token=")).unwrap();
        assert!(!csrf_cookie.contains("HttpOnly"));

        let refresh = cookie_value(&cookies, "refresh_token");
        let csrf = cookie_value(&cookies, "csrf_token");

        let body = json_body(response).await;
        assert_eq!(body["tokenType"], "Bearer");
        assert_eq!(body["sessionId"], launched.session_id.to_string());
        assert!(body.get("refreshToken").is_none());

        let response = router(&h)
            .oneshot(cookie_request("/auth/refresh", &refresh, &csrf, Some(&csrf)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Rotation hands out a new CSRF token along with the new refresh cookie
        let rotated = set_cookies(&response);
        assert_ne!(cookie_value(&rotated, "refresh_token"), refresh);
        assert_ne!(cookie_value(&rotated, "csrf_token"), csrf);
    }

    #[tokio::test]
    async fn test_cookie_refresh_requires_csrf_header() {
        let h = Harness::new();
        let (refresh, csrf) = webview_login(&h).await;

        let response = router(&h)
            .oneshot(cookie_request("/auth/refresh", &refresh, &csrf, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router(&h)
            .oneshot(cookie_request("/auth/refresh", &refresh, &csrf, Some("forged")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Rejected attempts did not burn the credential
        let response = router(&h)
            .oneshot(cookie_request("/auth/refresh", &refresh, &csrf, Some(&csrf)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cookie_logout_requires_csrf_header() {
        let h = Harness::new();
        let (refresh, csrf) = webview_login(&h).await;

        let response = router(&h)
            .oneshot(cookie_request("/auth/logout", &refresh, &csrf, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let stored = h.store.refresh_credential(&refresh_token_hash(&refresh)).await.unwrap();
        assert!(!stored.blacklisted);

        let response = router(&h)
            .oneshot(cookie_request("/auth/logout", &refresh, &csrf, Some(&csrf)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cleared = set_cookies(&response);
        assert!(cleared.iter().any(|c| c.starts_with("refresh_token=;")));
        assert!(cleared.iter().any(|c| c.starts_with("csrf_token=;")));
        let stored = h.store.refresh_credential(&refresh_token_hash(&refresh)).await.unwrap();
        assert!(stored.blacklisted);
    }

    #[tokio::test]
    async fn test_body_refresh_needs_no_csrf_header() {
        let h = Harness::new();
        let user = h.player(0).await;
        let pair = h.refresh().issue_pair(user.id).await.unwrap();

        let response = router(&h)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(
                        r#"{{"refreshToken":"{}"}}"#,
                        pair.refresh_token
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["refreshToken"].is_string());
    }

    #[tokio::test]
    async fn test_spin_endpoint_reports_insufficient_funds() {
        let h = Harness::new();
        let user = h.player(50).await;

        let response = router(&h)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/casino/spin")
                    .header(header::AUTHORIZATION, bearer(&h, &user))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"bet":100}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "insufficient_funds");
    }
}
