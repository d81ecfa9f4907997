//! Application Layer - Use Cases
//!
//! Orchestrates domain rules inside store transactions.

pub mod config;
pub mod issuance;
pub mod launch_game;
pub mod maintenance;
pub mod profile;
pub mod redeem_prize;
pub mod refresh_session;
pub mod spin_wheel;
pub mod submit_score;
