//! Repository Traits
//!
//! Interfaces for the shared store and the external collaborators.
//! Implementations are in the infrastructure layer.
//!
//! Every mutating method is a single atomic operation in the backing store;
//! callers never read a counter, change it, and write it back.

use crate::domain::entities::{HealthRecord, Identity};
use crate::domain::value_objects::{IdentityId, PlatformFailure, TargetRef};
use crate::error::CredentialResult;
use platform::rate_limit::RateLimitStore;
use std::collections::BTreeMap;
use std::time::Duration;

/// Health counters per identity
#[trait_variant::make(HealthRepository: Send)]
pub trait LocalHealthRepository {
    /// Create zero-valued records for ids not seen before. Returns how many
    /// were created.
    async fn ensure_records(&self, ids: &[IdentityId]) -> CredentialResult<u64>;

    /// Increment successes, stamp `last_success_at_ms` and delete any cooldown,
    /// all in one step
    async fn record_success(&self, id: &IdentityId, now_ms: i64)
    -> CredentialResult<HealthRecord>;

    /// Increment challenges and stamp `last_challenge_at_ms`. Returns the new count.
    async fn record_challenge(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<u64>;

    /// Increment the rate-limit counter and push its expiry to `now + ttl`.
    /// An expired counter restarts at 1. Returns the new count.
    async fn record_rate_limited(
        &self,
        id: &IdentityId,
        now_ms: i64,
        ttl: Duration,
    ) -> CredentialResult<u64>;

    /// Snapshot of the record; zero-valued if the identity was never seen
    async fn health_of(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<HealthRecord>;
}

/// Suspension deadlines per identity
#[trait_variant::make(CooldownRepository: Send)]
pub trait LocalCooldownRepository {
    /// Store `max(existing, resume_at_ms)`. Returns the deadline now in effect.
    async fn extend_cooldown(&self, id: &IdentityId, resume_at_ms: i64) -> CredentialResult<i64>;

    /// Active deadline, or `None` if absent or already passed
    async fn cooldown_until(&self, id: &IdentityId, now_ms: i64) -> CredentialResult<Option<i64>>;
}

/// Rolling per-identity usage window
#[trait_variant::make(UsageRepository: Send)]
pub trait LocalUsageRepository {
    /// Uses inside the window ending at `now_ms`
    async fn usage_count(
        &self,
        id: &IdentityId,
        now_ms: i64,
        window: Duration,
    ) -> CredentialResult<u32>;

    /// Trim the window, and if fewer than `cap` uses remain, record `now_ms`
    /// and stamp `last_used_at_ms`. Returns false when the cap was reached.
    async fn reserve_use(
        &self,
        id: &IdentityId,
        now_ms: i64,
        window: Duration,
        cap: u32,
    ) -> CredentialResult<bool>;
}

/// Removal of records that no longer carry information
#[trait_variant::make(MaintenanceRepository: Send)]
pub trait LocalMaintenanceRepository {
    /// Drop passed cooldowns and usage entries older than `usage_window`.
    /// Returns how many records were removed.
    async fn purge_expired(&self, now_ms: i64, usage_window: Duration) -> CredentialResult<u64>;
}

/// Everything the scheduling subsystem needs from one shared store
pub trait CredentialRepository:
    HealthRepository
    + CooldownRepository
    + UsageRepository
    + MaintenanceRepository
    + RateLimitStore
    + Send
    + Sync
    + 'static
{
}

impl<T> CredentialRepository for T where
    T: HealthRepository
        + CooldownRepository
        + UsageRepository
        + MaintenanceRepository
        + RateLimitStore
        + Send
        + Sync
        + 'static
{
}

/// Durable home of identity files
#[trait_variant::make(IdentitySource: Send)]
pub trait LocalIdentitySource {
    /// Load every readable identity. Unreadable entries are skipped.
    async fn load_all(&self) -> CredentialResult<Vec<Identity>>;

    /// Create or replace the identity file `name`
    async fn write(&self, name: &str, secrets: &BTreeMap<String, String>) -> CredentialResult<()>;

    /// Delete the identity file `name`. Returns false if it did not exist.
    async fn remove(&self, name: &str) -> CredentialResult<bool>;
}

/// One unit of platform work
#[trait_variant::make(PlatformClient: Send)]
pub trait LocalPlatformClient {
    /// Fetch the target's metadata using `identity`
    async fn fetch(
        &self,
        identity: &Identity,
        target: &TargetRef,
    ) -> Result<serde_json::Value, PlatformFailure>;
}
