//! Credential Selector
//!
//! Picks one identity for the next attempt: filter out the ineligible, score
//! the rest, then choose uniformly among the top few so no identity follows a
//! repeatable pattern.

use crate::application::config::CredentialConfig;
use crate::application::identity_registry::IdentityRegistry;
use crate::domain::entities::Identity;
use crate::domain::repository::{CooldownRepository, HealthRepository, UsageRepository};
use crate::domain::services::score;
use crate::domain::value_objects::IdentityId;
use crate::error::CredentialResult;
use platform::clock::Clock;
use platform::random::RandomSource;
use std::collections::HashSet;
use std::sync::Arc;

/// An eligible identity and its score
#[derive(Debug, Clone)]
pub struct Candidate {
    pub identity: Identity,
    pub score: f64,
    pub used_in_window: u32,
}

pub struct CredentialSelector<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    repo: Arc<R>,
    registry: Arc<IdentityRegistry>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    config: Arc<CredentialConfig>,
}

impl<R> Clone for CredentialSelector<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            registry: self.registry.clone(),
            clock: self.clock.clone(),
            random: self.random.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> CredentialSelector<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    pub fn new(
        repo: Arc<R>,
        registry: Arc<IdentityRegistry>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        config: Arc<CredentialConfig>,
    ) -> Self {
        Self {
            repo,
            registry,
            clock,
            random,
            config,
        }
    }

    /// Eligible identities, best score first
    ///
    /// Drops identities in `excluding`, in cooldown, or at their usage cap.
    pub async fn candidates(
        &self,
        excluding: &HashSet<IdentityId>,
    ) -> CredentialResult<Vec<Candidate>> {
        let now_ms = self.clock.now_ms();
        let cap = self.config.hourly_usage_cap;
        let mut candidates = Vec::new();

        for identity in self.registry.snapshot().iter() {
            if excluding.contains(&identity.id) {
                continue;
            }
            if self.repo.cooldown_until(&identity.id, now_ms).await?.is_some() {
                continue;
            }
            let used = self
                .repo
                .usage_count(&identity.id, now_ms, self.config.usage_window)
                .await?;
            if used >= cap {
                continue;
            }
            let health = self.repo.health_of(&identity.id, now_ms).await?;
            candidates.push(Candidate {
                score: score(&health, used, cap, now_ms, &self.config.score),
                identity: identity.clone(),
                used_in_window: used,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.identity.id.cmp(&b.identity.id))
        });
        Ok(candidates)
    }

    /// Choose and reserve an identity, or `None` if the pool is exhausted
    ///
    /// If a concurrent caller takes the last usage slot of the drawn identity
    /// the next best candidate is tried instead.
    pub async fn select_identity(
        &self,
        excluding: &HashSet<IdentityId>,
    ) -> CredentialResult<Option<Identity>> {
        let mut candidates = self.candidates(excluding).await?;
        let top_k = self.config.top_k.max(1);

        while !candidates.is_empty() {
            let window = candidates.len().min(top_k);
            let pick = self.random.index_below(window);
            let candidate = candidates.remove(pick);

            let reserved = self
                .repo
                .reserve_use(
                    &candidate.identity.id,
                    self.clock.now_ms(),
                    self.config.usage_window,
                    self.config.hourly_usage_cap,
                )
                .await?;

            if reserved {
                tracing::debug!(
                    identity_id = %candidate.identity.id,
                    score = candidate.score,
                    used_in_window = candidate.used_in_window + 1,
                    "Identity selected"
                );
                return Ok(Some(candidate.identity));
            }

            tracing::debug!(
                identity_id = %candidate.identity.id,
                "Usage cap reached concurrently, trying next candidate"
            );
        }

        Ok(None)
    }
}
