//! Identity Snapshot Use Case
//!
//! Read-only view of health, cooldown and usage per loaded identity.

use crate::application::config::CredentialConfig;
use crate::application::identity_registry::IdentityRegistry;
use crate::domain::entities::IdentitySnapshot;
use crate::domain::repository::{CooldownRepository, HealthRepository, UsageRepository};
use crate::error::CredentialResult;
use platform::clock::Clock;
use std::sync::Arc;

pub struct IdentitySnapshotUseCase<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    repo: Arc<R>,
    registry: Arc<IdentityRegistry>,
    clock: Arc<dyn Clock>,
    config: Arc<CredentialConfig>,
}

impl<R> IdentitySnapshotUseCase<R>
where
    R: HealthRepository + CooldownRepository + UsageRepository,
{
    pub fn new(
        repo: Arc<R>,
        registry: Arc<IdentityRegistry>,
        clock: Arc<dyn Clock>,
        config: Arc<CredentialConfig>,
    ) -> Self {
        Self {
            repo,
            registry,
            clock,
            config,
        }
    }

    pub async fn execute(&self) -> CredentialResult<Vec<IdentitySnapshot>> {
        let now_ms = self.clock.now_ms();
        let identities = self.registry.snapshot();
        let mut snapshots = Vec::with_capacity(identities.len());

        for identity in identities.iter() {
            snapshots.push(IdentitySnapshot {
                id: identity.id.clone(),
                source_name: identity.source_name.clone(),
                health: self.repo.health_of(&identity.id, now_ms).await?,
                cooldown_until_ms: self.repo.cooldown_until(&identity.id, now_ms).await?,
                used_in_window: self
                    .repo
                    .usage_count(&identity.id, now_ms, self.config.usage_window)
                    .await?,
            });
        }

        Ok(snapshots)
    }
}
