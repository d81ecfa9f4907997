//! Rewards Router

use axum::{
    Router,
    routing::{get, patch, post},
};
use kernel::clock::{Clock, SystemClock};
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::domain::repository::RewardsStore;
use crate::infra::postgres::PgRewardsStore;
use crate::presentation::handlers::{self, RewardsAppState};

/// Create the rewards router with the PostgreSQL store and the system clock
pub fn rewards_router(store: PgRewardsStore, config: RewardsConfig) -> Router {
    rewards_router_generic(store, config, Arc::new(SystemClock))
}

/// Create a rewards router for any store implementation and clock
pub fn rewards_router_generic<S>(store: S, config: RewardsConfig, clock: Arc<dyn Clock>) -> Router
where
    S: RewardsStore + Send + Sync + 'static,
{
    let state = RewardsAppState::new(store, config, clock);

    Router::new()
        .route("/auth/refresh", post(handlers::refresh::<S>))
        .route("/auth/logout", post(handlers::logout::<S>))
        .route(
            "/auth/webview/exchange",
            post(handlers::exchange_launch_code::<S>),
        )
        .route("/games/{game_id}/launch", post(handlers::launch_game::<S>))
        .route(
            "/game/sessions/{session_id}/launch-code",
            post(handlers::reissue_launch_code::<S>),
        )
        .route("/game/score", post(handlers::submit_score::<S>))
        .route("/casino/spin", post(handlers::spin::<S>))
        .route("/main/energy", get(handlers::energy::<S>))
        .route("/profile/me", patch(handlers::patch_profile::<S>))
        .route(
            "/profile/inventory/{item_id}/code",
            post(handlers::issue_redeem_code::<S>),
        )
        .route("/admin/prizes/redeem", post(handlers::redeem_prize::<S>))
        .with_state(state)
}
