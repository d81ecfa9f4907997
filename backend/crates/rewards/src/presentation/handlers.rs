//! HTTP Handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse};
use kernel::clock::Clock;
use kernel::id::{GameSessionId, InventoryItemId};
use platform::cookie::CookieConfig;
use platform::crypto::{constant_time_eq, random_urlsafe_token};
use platform::jwt::JwtKeys;
use std::sync::Arc;

use crate::application::config::RewardsConfig;
use crate::application::launch_game::LaunchGameUseCase;
use crate::application::profile::ProfileUseCase;
use crate::application::redeem_prize::RedeemPrizeUseCase;
use crate::application::refresh_session::RefreshSessionUseCase;
use crate::application::spin_wheel::SpinWheelUseCase;
use crate::application::submit_score::SubmitScoreUseCase;
use crate::domain::entities::RedemptionRecord;
use crate::domain::repository::RewardsStore;
use crate::domain::services::energy::EnergyState;
use crate::domain::value_objects::ProfilePatch;
use crate::error::{RewardsError, RewardsResult};
use crate::presentation::dto::{
    ExchangeRequest, ExchangeResponse, LaunchCodeResponse, LaunchResponse, ProfileResponse,
    CSRF_HEADER, RedeemCodeResponse, RedeemRequest, RefreshRequest, ScoreRequest, ScoreResponse,
    SpinRequest, SpinResponse, TOKEN_TYPE_BEARER, TokenResponse,
};
use crate::presentation::middleware::{AdminUser, AuthUser};

/// Shared state for rewards handlers
pub struct RewardsAppState<S>
where
    S: RewardsStore + Send + Sync + 'static,
{
    pub store: Arc<S>,
    pub keys: Arc<JwtKeys>,
    pub config: Arc<RewardsConfig>,
    pub clock: Arc<dyn Clock>,
}

impl<S> RewardsAppState<S>
where
    S: RewardsStore + Send + Sync + 'static,
{
    pub fn new(store: S, config: RewardsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(store),
            keys: Arc::new(JwtKeys::from_secret(&config.access_token_secret)),
            config: Arc::new(config),
            clock,
        }
    }

    fn refresh_session(&self) -> RefreshSessionUseCase<S> {
        RefreshSessionUseCase::new(
            self.store.clone(),
            self.keys.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }

    fn launch_game(&self) -> LaunchGameUseCase<S> {
        LaunchGameUseCase::new(
            self.store.clone(),
            self.keys.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }
}

impl<S> Clone for RewardsAppState<S>
where
    S: RewardsStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            keys: self.keys.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// POST /auth/refresh
pub async fn refresh<S>(
    State(state): State<RewardsAppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> RewardsResult<impl IntoResponse>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let presented = presented_refresh_token(&state.config, &headers, &body)?
        .ok_or(RewardsError::Unauthorized)?;

    let pair = state.refresh_session().rotate(&presented).await?;
    let cookies = session_cookies(&state.config, &pair.refresh_token)?;

    Ok((cookies, Json(TokenResponse::from(pair))))
}

/// POST /auth/logout
pub async fn logout<S>(
    State(state): State<RewardsAppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> RewardsResult<impl IntoResponse>
where
    S: RewardsStore + Send + Sync + 'static,
{
    if let Some(presented) = presented_refresh_token(&state.config, &headers, &body)? {
        state.refresh_session().revoke(&presented).await?;
    }

    let cookies = AppendHeaders([
        (header::SET_COOKIE, deleted_cookie(&state.config.refresh_cookie())?),
        (header::SET_COOKIE, deleted_cookie(&state.config.csrf_cookie())?),
    ]);

    tracing::info!("Logged out");

    Ok((StatusCode::NO_CONTENT, cookies))
}

/// POST /auth/webview/exchange
pub async fn exchange_launch_code<S>(
    State(state): State<RewardsAppState<S>>,
    Json(req): Json<ExchangeRequest>,
) -> RewardsResult<impl IntoResponse>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let output = state.launch_game().exchange(&req.code).await?;
    let cookies = session_cookies(&state.config, &output.tokens.refresh_token)?;

    let response = ExchangeResponse {
        access_token: output.tokens.access_token,
        token_type: TOKEN_TYPE_BEARER,
        expires_in: output.tokens.access_expires_in,
        user_id: output.user_id,
        session_id: output.session_id,
    };

    Ok((cookies, Json(response)))
}

/// POST /games/{game_id}/launch
pub async fn launch_game<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
    Path(game_id): Path<String>,
) -> RewardsResult<Json<LaunchResponse>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let output = state.launch_game().launch(user.user_id, &game_id).await?;
    Ok(Json(output.into()))
}

/// POST /game/sessions/{session_id}/launch-code
pub async fn reissue_launch_code<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
    Path(session_id): Path<GameSessionId>,
) -> RewardsResult<Json<LaunchCodeResponse>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let issued = state
        .launch_game()
        .issue_code(user.user_id, session_id)
        .await?;
    Ok(Json(issued.into()))
}

/// POST /game/score
pub async fn submit_score<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
    Json(req): Json<ScoreRequest>,
) -> RewardsResult<Json<ScoreResponse>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    // A webview token may only report its own session
    if user.session_id.is_some_and(|sid| sid != req.session_id) {
        return Err(RewardsError::NotFound);
    }

    let use_case = SubmitScoreUseCase::new(state.store.clone(), state.clock.clone());
    let outcome = use_case
        .submit(user.user_id, req.session_id, req.score)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /casino/spin
pub async fn spin<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
    Json(req): Json<SpinRequest>,
) -> RewardsResult<Json<SpinResponse>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let use_case = SpinWheelUseCase::new(
        state.store.clone(),
        state.config.clone(),
        state.clock.clone(),
    );
    let outcome = use_case.spin(user.user_id, req.bet).await?;
    Ok(Json(outcome.into()))
}

/// GET /main/energy
pub async fn energy<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
) -> RewardsResult<Json<EnergyState>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let use_case = ProfileUseCase::new(
        state.store.clone(),
        state.config.clone(),
        state.clock.clone(),
    );
    Ok(Json(use_case.energy_status(user.user_id).await?))
}

/// PATCH /profile/me
pub async fn patch_profile<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> RewardsResult<Json<ProfileResponse>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let use_case = ProfileUseCase::new(
        state.store.clone(),
        state.config.clone(),
        state.clock.clone(),
    );
    let updated = use_case.patch_profile(user.user_id, patch).await?;
    Ok(Json(updated.into()))
}

/// POST /profile/inventory/{item_id}/code
pub async fn issue_redeem_code<S>(
    State(state): State<RewardsAppState<S>>,
    user: AuthUser,
    Path(item_id): Path<InventoryItemId>,
) -> RewardsResult<Json<RedeemCodeResponse>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let use_case = RedeemPrizeUseCase::new(
        state.store.clone(),
        state.config.clone(),
        state.clock.clone(),
    );
    let issued = use_case.issue_token(user.user_id, item_id).await?;
    Ok(Json(issued.into()))
}

/// POST /admin/prizes/redeem
pub async fn redeem_prize<S>(
    State(state): State<RewardsAppState<S>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<RedeemRequest>,
) -> RewardsResult<Json<RedemptionRecord>>
where
    S: RewardsStore + Send + Sync + 'static,
{
    let use_case = RedeemPrizeUseCase::new(
        state.store.clone(),
        state.config.clone(),
        state.clock.clone(),
    );
    let record = use_case.redeem(&req.token).await?;

    tracing::info!(admin_id = %admin.user_id, item_id = %record.item_id, "Redemption confirmed");

    Ok(Json(record))
}

/// Refresh token from the JSON body, falling back to the cookie.
///
/// A cookie-borne token is only accepted with a matching `X-CSRF-Token`.
fn presented_refresh_token(
    config: &RewardsConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> RewardsResult<Option<String>> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(body)
            .map_err(|e| RewardsError::InvalidInput(format!("malformed body: {e}")))?
            .refresh_token
            .filter(|token| !token.is_empty())
    };
    if from_body.is_some() {
        return Ok(from_body);
    }

    let from_cookie = platform::cookie::extract_cookie(headers, &config.refresh_cookie_name);
    if from_cookie.is_some() {
        verify_csrf(config, headers)?;
    }
    Ok(from_cookie)
}

fn verify_csrf(config: &RewardsConfig, headers: &HeaderMap) -> RewardsResult<()> {
    let cookie = platform::cookie::extract_cookie(headers, &config.csrf_cookie_name);
    let echoed = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    match (cookie, echoed) {
        (Some(cookie), Some(echoed)) if constant_time_eq(cookie.as_bytes(), echoed.as_bytes()) => {
            Ok(())
        }
        _ => {
            tracing::warn!("Refresh cookie presented without a matching CSRF token");
            Err(RewardsError::Forbidden)
        }
    }
}

/// Refresh cookie plus a fresh CSRF cookie.
fn session_cookies(
    config: &RewardsConfig,
    refresh_token: &str,
) -> RewardsResult<AppendHeaders<[(HeaderName, HeaderValue); 2]>> {
    let csrf_token = random_urlsafe_token(config.csrf_token_bytes);
    Ok(AppendHeaders([
        (header::SET_COOKIE, set_cookie(&config.refresh_cookie(), refresh_token)?),
        (header::SET_COOKIE, set_cookie(&config.csrf_cookie(), &csrf_token)?),
    ]))
}

fn set_cookie(cookie: &CookieConfig, value: &str) -> RewardsResult<HeaderValue> {
    platform::cookie::set_cookie_header(cookie, value)
        .ok_or_else(|| RewardsError::Internal("unencodable cookie".into()))
}

fn deleted_cookie(cookie: &CookieConfig) -> RewardsResult<HeaderValue> {
    platform::cookie::delete_cookie_header(cookie)
        .ok_or_else(|| RewardsError::Internal("unencodable cookie".into()))
}
