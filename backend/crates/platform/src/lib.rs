//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (CSPRNG tokens, SHA-256, base64)
//! - HS256 access tokens
//! - Cookie management

pub mod cookie;
pub mod crypto;
pub mod jwt;
