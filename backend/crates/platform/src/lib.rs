//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Time and randomness behind injectable traits
//! - Sliding-window rate limiting contract and in-memory store
//! - Round-robin pool of reusable handles
//! - Cryptographic helpers (SHA-256, constant-time compare)
//! - Outbound cookie headers and HTTP client construction
//! - Client address extraction

pub mod client;
pub mod clock;
pub mod cookie;
pub mod crypto;
pub mod handle_pool;
pub mod http_client;
pub mod random;
pub mod rate_limit;
