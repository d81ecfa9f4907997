//! Application Configuration
//!
//! Configuration for the rewards application layer.

use chrono::TimeDelta;
use std::time::Duration;

pub use crate::domain::services::prize_selector::WeightingPolicy;
pub use platform::cookie::SameSite;
use platform::cookie::CookieConfig;

/// Longest lifetime any credential or interval may be configured with.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

#[derive(Debug, Clone)]
pub struct RewardsConfig {
    /// HS256 secret for access tokens
    pub access_token_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Random bytes per refresh token (64 = 512 bits)
    pub refresh_token_bytes: usize,
    pub launch_code_ttl: Duration,
    /// Random bytes per launch code (32 = 256 bits)
    pub launch_code_bytes: usize,
    pub redeem_token_ttl: Duration,
    /// Alphanumeric characters per QR redeem token
    pub redeem_token_len: usize,
    /// Attempts at generating a non-colliding credential value
    pub max_issue_attempts: u32,
    pub energy_max: i32,
    pub energy_refill_interval: Duration,
    pub game_energy_cost: i32,
    /// Webview entry point, launch codes are appended as `?sid=..#code=..`
    pub game_url: String,
    pub prize_weighting: WeightingPolicy,
    pub refresh_cookie_name: String,
    /// Readable cookie echoed back in `X-CSRF-Token` on cookie-authenticated calls
    pub csrf_cookie_name: String,
    pub csrf_token_bytes: usize,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            access_token_secret: Vec::new(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            refresh_token_bytes: 64,
            launch_code_ttl: Duration::from_secs(120),
            launch_code_bytes: 32,
            redeem_token_ttl: Duration::from_secs(300),
            redeem_token_len: 10,
            max_issue_attempts: 3,
            energy_max: 10,
            energy_refill_interval: Duration::from_secs(300),
            game_energy_cost: 1,
            game_url: "http://localhost:5173/game".to_string(),
            prize_weighting: WeightingPolicy::Rarity,
            refresh_cookie_name: "refresh_token".to_string(),
            csrf_cookie_name: "csrf_token".to_string(),
            csrf_token_bytes: 32,
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
        }
    }
}

impl RewardsConfig {
    /// Create config with a random access-token secret (for development)
    pub fn with_random_secret() -> Self {
        Self {
            access_token_secret: platform::crypto::random_bytes(32),
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    pub fn access_token_ttl_delta(&self) -> TimeDelta {
        to_delta(self.access_token_ttl)
    }

    pub fn refresh_token_ttl_delta(&self) -> TimeDelta {
        to_delta(self.refresh_token_ttl)
    }

    pub fn launch_code_ttl_delta(&self) -> TimeDelta {
        to_delta(self.launch_code_ttl)
    }

    pub fn redeem_token_ttl_delta(&self) -> TimeDelta {
        to_delta(self.redeem_token_ttl)
    }

    pub fn energy_refill_secs(&self) -> i64 {
        self.energy_refill_interval.as_secs().clamp(1, MAX_TTL.as_secs()) as i64
    }

    pub fn launch_url(&self, session_id: &str, code: &str) -> String {
        format!("{}?sid={}#code={}", self.game_url, session_id, code)
    }

    /// Cookie carrying the web refresh credential; lives as long as the credential.
    pub fn refresh_cookie(&self) -> CookieConfig {
        CookieConfig::refresh_token(
            self.refresh_cookie_name.clone(),
            self.refresh_token_ttl_delta().num_seconds(),
        )
        .with_secure(self.cookie_secure)
        .with_same_site(self.cookie_same_site)
    }

    /// Double-submit CSRF cookie, issued next to every refresh cookie.
    pub fn csrf_cookie(&self) -> CookieConfig {
        CookieConfig::csrf_token(
            self.csrf_cookie_name.clone(),
            self.refresh_token_ttl_delta().num_seconds(),
        )
        .with_secure(self.cookie_secure)
        .with_same_site(self.cookie_same_site)
    }
}

/// Durations above `MAX_TTL` are clamped so `now + ttl` cannot overflow.
fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration.min(MAX_TTL)).unwrap_or_default()
}
