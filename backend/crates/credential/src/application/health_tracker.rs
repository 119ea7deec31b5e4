//! Health Tracker
//!
//! Records the outcome of every attempt. Challenge and rate-limit writes
//! also apply the matching cooldown.

use crate::application::config::CredentialConfig;
use crate::application::cooldown::{CooldownScheduler, CooldownSignal};
use crate::domain::entities::HealthRecord;
use crate::domain::repository::{CooldownRepository, HealthRepository};
use crate::domain::value_objects::IdentityId;
use crate::error::CredentialResult;
use platform::clock::Clock;
use std::sync::Arc;

pub struct HealthTracker<R>
where
    R: HealthRepository + CooldownRepository,
{
    repo: Arc<R>,
    cooldowns: CooldownScheduler<R>,
    clock: Arc<dyn Clock>,
    config: Arc<CredentialConfig>,
}

impl<R> Clone for HealthTracker<R>
where
    R: HealthRepository + CooldownRepository,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            cooldowns: self.cooldowns.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> HealthTracker<R>
where
    R: HealthRepository + CooldownRepository,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, config: Arc<CredentialConfig>) -> Self {
        Self {
            cooldowns: CooldownScheduler::new(repo.clone(), clock.clone(), config.clone()),
            repo,
            clock,
            config,
        }
    }

    /// Count a success. Any active cooldown is lifted; counters are kept.
    pub async fn record_success(&self, id: &IdentityId) -> CredentialResult<HealthRecord> {
        let record = self.repo.record_success(id, self.clock.now_ms()).await?;
        tracing::info!(
            identity_id = %id,
            successes = record.successes,
            challenges = record.challenges,
            "Identity succeeded"
        );
        Ok(record)
    }

    /// Count a challenge and suspend the identity. Returns the new challenge count.
    pub async fn record_challenge(&self, id: &IdentityId) -> CredentialResult<u64> {
        let challenges = self.repo.record_challenge(id, self.clock.now_ms()).await?;
        self.cooldowns
            .apply(id, CooldownSignal::Challenge, challenges)
            .await?;
        Ok(challenges)
    }

    /// Count a rate-limit signal and suspend the identity. Returns the new count.
    pub async fn record_rate_limited(&self, id: &IdentityId) -> CredentialResult<u64> {
        let rate_limits = self
            .repo
            .record_rate_limited(id, self.clock.now_ms(), self.config.rate_limit_counter_ttl)
            .await?;
        self.cooldowns
            .apply(id, CooldownSignal::RateLimited, rate_limits)
            .await?;
        Ok(rate_limits)
    }

    pub async fn health_of(&self, id: &IdentityId) -> CredentialResult<HealthRecord> {
        self.repo.health_of(id, self.clock.now_ms()).await
    }

    /// Create zero-valued records for identities seen for the first time
    pub async fn ensure_records(&self, ids: &[IdentityId]) -> CredentialResult<u64> {
        let created = self.repo.ensure_records(ids).await?;
        if created > 0 {
            tracing::info!(created, "Health records created for new identities");
        }
        Ok(created)
    }

    pub fn cooldowns(&self) -> &CooldownScheduler<R> {
        &self.cooldowns
    }
}
