//! Cooldown Scheduler
//!
//! Turns challenge and rate-limit signals into suspension deadlines.

use crate::application::config::CredentialConfig;
use crate::domain::repository::CooldownRepository;
use crate::domain::value_objects::IdentityId;
use crate::error::CredentialResult;
use platform::clock::{Clock, duration_ms};
use std::sync::Arc;
use std::time::Duration;

/// What triggered a cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownSignal {
    Challenge,
    RateLimited,
}

impl CooldownSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownSignal::Challenge => "challenge",
            CooldownSignal::RateLimited => "rate_limited",
        }
    }
}

pub struct CooldownScheduler<R>
where
    R: CooldownRepository,
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    config: Arc<CredentialConfig>,
}

impl<R> Clone for CooldownScheduler<R>
where
    R: CooldownRepository,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> CooldownScheduler<R>
where
    R: CooldownRepository,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, config: Arc<CredentialConfig>) -> Self {
        Self {
            repo,
            clock,
            config,
        }
    }

    /// Suspension length for the `count`-th signal of this kind
    pub fn cooldown_for(&self, signal: CooldownSignal, count: u64) -> Duration {
        match signal {
            CooldownSignal::Challenge => self.config.challenge_cooldown.duration_for(count),
            CooldownSignal::RateLimited => self.config.rate_limit_cooldown.duration_for(count),
        }
    }

    /// Suspend `id` after its `count`-th signal. An already longer suspension
    /// is kept. Returns the deadline in effect.
    pub async fn apply(
        &self,
        id: &IdentityId,
        signal: CooldownSignal,
        count: u64,
    ) -> CredentialResult<i64> {
        let cooldown = self.cooldown_for(signal, count);
        let now_ms = self.clock.now_ms();
        let requested = now_ms.saturating_add(duration_ms(cooldown));
        let resume_at_ms = self.repo.extend_cooldown(id, requested).await?;

        tracing::warn!(
            identity_id = %id,
            signal = signal.as_str(),
            count,
            cooldown_minutes = cooldown.as_secs() / 60,
            resume_at_ms,
            "Identity cooling down"
        );

        Ok(resume_at_ms)
    }

    pub async fn is_in_cooldown(&self, id: &IdentityId) -> CredentialResult<bool> {
        Ok(self.cooldown_until(id).await?.is_some())
    }

    /// Active deadline for `id`, if any
    pub async fn cooldown_until(&self, id: &IdentityId) -> CredentialResult<Option<i64>> {
        self.repo.cooldown_until(id, self.clock.now_ms()).await
    }
}
