//! Credential Context
//!
//! Owns the shared pieces (store, platform client, identity source, registry,
//! task table, clock, randomness) and builds components on demand. Components
//! are cheap handles over the same `Arc`s.

use crate::application::admin::IdentitySnapshotUseCase;
use crate::application::config::CredentialConfig;
use crate::application::cooldown::CooldownScheduler;
use crate::application::credential_store::CredentialStore;
use crate::application::health_tracker::HealthTracker;
use crate::application::identity_registry::IdentityRegistry;
use crate::application::maintenance::MaintenanceJob;
use crate::application::rate_limiter::ClientRateLimiter;
use crate::application::retry::RetryOrchestrator;
use crate::application::selector::CredentialSelector;
use crate::application::submit::SubmitDownloadUseCase;
use crate::application::task_tracker::TaskTracker;
use crate::domain::repository::{CredentialRepository, IdentitySource, PlatformClient};
use platform::clock::{Clock, SystemClock};
use platform::random::{RandomSource, ThreadRandom};
use std::sync::Arc;

pub struct CredentialContext<R, P, S>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub platform: Arc<P>,
    pub source: Arc<S>,
    pub registry: Arc<IdentityRegistry>,
    pub tasks: Arc<TaskTracker>,
    pub config: Arc<CredentialConfig>,
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn RandomSource>,
}

impl<R, P, S> Clone for CredentialContext<R, P, S>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            platform: self.platform.clone(),
            source: self.source.clone(),
            registry: self.registry.clone(),
            tasks: self.tasks.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            random: self.random.clone(),
        }
    }
}

impl<R, P, S> CredentialContext<R, P, S>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    pub fn new(repo: R, platform: P, source: S, config: CredentialConfig) -> Self {
        Self::with_clock_and_random(
            repo,
            platform,
            source,
            config,
            Arc::new(SystemClock),
            Arc::new(ThreadRandom),
        )
    }

    pub fn with_clock_and_random(
        repo: R,
        platform: P,
        source: S,
        config: CredentialConfig,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            repo: Arc::new(repo),
            platform: Arc::new(platform),
            source: Arc::new(source),
            registry: Arc::new(IdentityRegistry::default()),
            tasks: Arc::new(TaskTracker::new(clock.clone())),
            config: Arc::new(config),
            clock,
            random,
        }
    }

    pub fn cooldowns(&self) -> CooldownScheduler<R> {
        CooldownScheduler::new(self.repo.clone(), self.clock.clone(), self.config.clone())
    }

    pub fn health_tracker(&self) -> HealthTracker<R> {
        HealthTracker::new(self.repo.clone(), self.clock.clone(), self.config.clone())
    }

    pub fn selector(&self) -> CredentialSelector<R> {
        CredentialSelector::new(
            self.repo.clone(),
            self.registry.clone(),
            self.clock.clone(),
            self.random.clone(),
            self.config.clone(),
        )
    }

    pub fn orchestrator(&self) -> RetryOrchestrator<R> {
        RetryOrchestrator::new(
            self.selector(),
            self.health_tracker(),
            self.random.clone(),
            self.config.clone(),
        )
    }

    pub fn rate_limiter(&self) -> ClientRateLimiter<R> {
        ClientRateLimiter::new(
            self.repo.clone(),
            self.clock.clone(),
            self.config.client_rate_limit.clone(),
        )
    }

    pub fn credential_store(&self) -> CredentialStore<S, R> {
        CredentialStore::new(
            self.source.clone(),
            self.registry.clone(),
            self.health_tracker(),
        )
    }

    pub fn submit_use_case(&self) -> SubmitDownloadUseCase<R, P> {
        SubmitDownloadUseCase::new(
            self.rate_limiter(),
            self.orchestrator(),
            self.platform.clone(),
            self.tasks.clone(),
        )
    }

    pub fn snapshot_use_case(&self) -> IdentitySnapshotUseCase<R> {
        IdentitySnapshotUseCase::new(
            self.repo.clone(),
            self.registry.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    pub fn maintenance(&self) -> MaintenanceJob<R> {
        MaintenanceJob::new(
            self.repo.clone(),
            self.tasks.clone(),
            self.rate_limiter(),
            self.clock.clone(),
            self.config.clone(),
        )
    }
}
