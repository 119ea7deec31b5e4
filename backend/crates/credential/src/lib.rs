//! Credential Scheduling & Retry
//!
//! Spreads outbound platform requests over a pool of revocable identities.
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, pure scoring/cooldown math, repository traits
//! - `application/` - Health tracking, cooldowns, selection, retry orchestration,
//!   client rate limiting, task tracking, identity store
//! - `infra/` - Postgres and in-memory stores, identity files, HTTP platform client
//! - `presentation/` - HTTP handlers
//!
//! ## Concurrency Model
//! - Every health/cooldown/usage/window mutation is one atomic store operation
//! - The identity list is swapped as a whole snapshot on reload
//! - Each logical operation owns its retry loop; nothing is shared between
//!   operations except the stores

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::CredentialConfig;
pub use application::context::CredentialContext;
pub use error::{CredentialError, CredentialResult};
pub use infra::identity_files::FileIdentitySource;
pub use infra::memory::MemoryCredentialStore;
pub use infra::platform_http::HttpPlatformClient;
pub use infra::postgres::PgCredentialRepository;
pub use presentation::router::credential_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
