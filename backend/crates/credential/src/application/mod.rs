//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.
//! Contains the scheduling components and the use cases built on them.

pub mod admin;
pub mod config;
pub mod context;
pub mod cooldown;
pub mod credential_store;
pub mod health_tracker;
pub mod identity_registry;
pub mod maintenance;
pub mod rate_limiter;
pub mod retry;
pub mod selector;
pub mod submit;
pub mod task_tracker;
