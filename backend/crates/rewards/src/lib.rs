//! Rewards Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, single-use credential rules, energy and prize services, store traits
//! - `application/` - Use cases
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers
//!
//! ## Credential Model
//! - Refresh credentials, launch codes and redeem tokens are random, time-bound and single-use
//! - Consumption is one conditional write; the affected-row count decides the single winner
//! - Expiry is always evaluated against the injected [`kernel::clock::Clock`]
//! - Wallet, energy and team scores are read-modify-write under row locks in one transaction

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

pub use application::config::RewardsConfig;
pub use error::{RewardsError, RewardsResult};
pub use infra::memory::MemoryRewardsStore;
pub use infra::postgres::PgRewardsStore;
pub use presentation::dto::CSRF_HEADER;
pub use presentation::router::{rewards_router, rewards_router_generic};

pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
