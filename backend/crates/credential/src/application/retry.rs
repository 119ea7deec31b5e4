//! Retry Orchestrator
//!
//! Runs one logical platform operation with bounded attempts, rotating
//! identities and backing off exponentially with jitter between attempts.

use crate::application::config::CredentialConfig;
use crate::application::health_tracker::HealthTracker;
use crate::application::selector::CredentialSelector;
use crate::domain::entities::Identity;
use crate::domain::repository::{CooldownRepository, HealthRepository, UsageRepository};
use crate::domain::services::backoff_delay;
use crate::domain::value_objects::{FailureClass, IdentityId, PlatformFailure};
use crate::error::{CredentialError, CredentialResult};
use platform::random::RandomSource;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Attempt budget for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CredentialConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
        }
    }
}

pub struct RetryOrchestrator<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    selector: CredentialSelector<R>,
    health: HealthTracker<R>,
    random: Arc<dyn RandomSource>,
    config: Arc<CredentialConfig>,
}

impl<R> Clone for RetryOrchestrator<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    fn clone(&self) -> Self {
        Self {
            selector: self.selector.clone(),
            health: self.health.clone(),
            random: self.random.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> RetryOrchestrator<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    pub fn new(
        selector: CredentialSelector<R>,
        health: HealthTracker<R>,
        random: Arc<dyn RandomSource>,
        config: Arc<CredentialConfig>,
    ) -> Self {
        Self {
            selector,
            health,
            random,
            config,
        }
    }

    /// Run `work` with the configured attempt budget
    pub async fn execute<T, F, Fut>(&self, work: F) -> CredentialResult<T>
    where
        F: FnMut(Identity) -> Fut,
        Fut: Future<Output = Result<T, PlatformFailure>>,
    {
        self.execute_with(RetryPolicy::from_config(&self.config), work)
            .await
    }

    /// Run `work` until it succeeds, fails non-retryably, the pool runs dry,
    /// or `policy.max_attempts` attempts have been made
    pub async fn execute_with<T, F, Fut>(
        &self,
        policy: RetryPolicy,
        mut work: F,
    ) -> CredentialResult<T>
    where
        F: FnMut(Identity) -> Fut,
        Fut: Future<Output = Result<T, PlatformFailure>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut tried: HashSet<IdentityId> = HashSet::new();
        let mut last_failure: Option<PlatformFailure> = None;

        for attempt in 0..max_attempts {
            let Some(identity) = self.selector.select_identity(&tried).await? else {
                tracing::warn!(
                    attempt = attempt + 1,
                    last_error = ?last_failure.as_ref().map(|f| f.to_string()),
                    "No eligible identity"
                );
                return Err(CredentialError::PoolExhausted {
                    last_error: last_failure.map(|f| f.message),
                });
            };
            let identity_id = identity.id.clone();

            let outcome =
                match tokio::time::timeout(self.config.request_timeout, work(identity)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(PlatformFailure::transient(format!(
                        "platform call timed out after {}s",
                        self.config.request_timeout.as_secs()
                    ))),
                };

            let failure = match outcome {
                Ok(value) => {
                    self.health.record_success(&identity_id).await?;
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            tracing::warn!(
                identity_id = %identity_id,
                attempt = attempt + 1,
                max_attempts,
                class = failure.class.as_str(),
                error = %failure.message,
                "Platform attempt failed"
            );

            if !failure.class.is_retryable() {
                return Err(CredentialError::InvalidTarget(failure.message));
            }

            match failure.class {
                FailureClass::Challenge => {
                    self.health.record_challenge(&identity_id).await?;
                }
                FailureClass::RateLimited => {
                    self.health.record_rate_limited(&identity_id).await?;
                }
                _ => {}
            }

            if failure.class.is_identity_specific() {
                tried.insert(identity_id);
            }
            last_failure = Some(failure);

            if attempt + 1 < max_attempts {
                let jitter_ms = self.random.in_range(self.config.jitter_range_ms());
                let delay =
                    backoff_delay(policy.base_delay, attempt, Duration::from_millis(jitter_ms));
                tracing::info!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }

        let (class, message) = match last_failure {
            Some(failure) => (failure.class, failure.message),
            None => (FailureClass::Transient, "no attempt completed".to_string()),
        };
        tracing::error!(
            attempts = max_attempts,
            class = class.as_str(),
            error = %message,
            "Platform operation exhausted its attempts"
        );
        Err(CredentialError::Platform {
            class,
            message,
            attempts: max_attempts,
        })
    }
}
