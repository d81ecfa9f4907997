//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use anyhow::Context;
use axum::{
    Router, http,
    http::{HeaderName, Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use kernel::clock::{Clock, SystemClock};
use rewards::application::config::{MAX_TTL, SameSite, WeightingPolicy};
use rewards::application::maintenance::CleanupExpiredUseCase;
use rewards::{CSRF_HEADER, PgRewardsStore, RewardsConfig, rewards_router};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,rewards=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let store = PgRewardsStore::new(pool.clone());

    // Startup cleanup: remove expired credentials
    // Errors here should not prevent server startup
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cleanup = CleanupExpiredUseCase::new(Arc::new(store.clone()), clock);
    if let Err(e) = cleanup.execute().await {
        tracing::warn!(error = %e, "Credential cleanup failed, continuing anyway");
    }

    let config = load_config()?;

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api", rewards_router(store, config))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env_or("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 31113)))?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_config() -> anyhow::Result<RewardsConfig> {
    let mut config = match env::var("ACCESS_TOKEN_SECRET") {
        Ok(secret_b64) => {
            let secret = general_purpose::STANDARD
                .decode(secret_b64.trim())
                .context("ACCESS_TOKEN_SECRET must be base64")?;
            anyhow::ensure!(
                secret.len() >= 32,
                "ACCESS_TOKEN_SECRET must decode to at least 32 bytes"
            );
            RewardsConfig {
                access_token_secret: secret,
                ..RewardsConfig::default()
            }
        }
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("ACCESS_TOKEN_SECRET not set, using a random development secret");
            RewardsConfig::development()
        }
        Err(_) => anyhow::bail!("ACCESS_TOKEN_SECRET must be set in production"),
    };

    config.access_token_ttl = env_secs("ACCESS_TOKEN_TTL_SECS", config.access_token_ttl)?;
    config.refresh_token_ttl = env_secs("REFRESH_TOKEN_TTL_SECS", config.refresh_token_ttl)?;
    config.launch_code_ttl = env_secs("LAUNCH_CODE_TTL_SECS", config.launch_code_ttl)?;
    config.redeem_token_ttl = env_secs("REDEEM_TOKEN_TTL_SECS", config.redeem_token_ttl)?;
    config.energy_refill_interval =
        env_secs("ENERGY_REFILL_SECS", config.energy_refill_interval)?;
    config.energy_max = env_or("ENERGY_MAX", config.energy_max)?;
    config.game_energy_cost = env_or("GAME_ENERGY_COST", config.game_energy_cost)?;

    if let Ok(game_url) = env::var("GAME_URL") {
        config.game_url = game_url;
    }
    if let Ok(name) = env::var("PRIZE_WEIGHTING") {
        config.prize_weighting = WeightingPolicy::from_name(&name)
            .with_context(|| format!("unknown PRIZE_WEIGHTING `{name}`"))?;
    }
    if let Ok(name) = env::var("COOKIE_SAME_SITE") {
        config.cookie_same_site = SameSite::from_name(&name)
            .with_context(|| format!("unknown COOKIE_SAME_SITE `{name}`"))?;
    }

    tracing::info!(
        energy_max = config.energy_max,
        energy_refill_secs = config.energy_refill_secs(),
        prize_weighting = ?config.prize_weighting,
        "Rewards configuration loaded"
    );

    Ok(config)
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> anyhow::Result<Duration> {
    let secs = env_or(name, default.as_secs())?;
    anyhow::ensure!(
        (1..=MAX_TTL.as_secs()).contains(&secs),
        "{name} must be between 1 and {} seconds",
        MAX_TTL.as_secs()
    );
    Ok(Duration::from_secs(secs))
}
