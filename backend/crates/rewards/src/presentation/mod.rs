//! Presentation Layer
//!
//! HTTP handlers, extractors and DTOs for the API.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
