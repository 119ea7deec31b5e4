//! Periodic Maintenance
//!
//! Sweeps expired tasks, forgets idle client windows and purges dead store
//! records on a fixed interval. Failures are logged and retried next tick.

use crate::application::config::CredentialConfig;
use crate::application::rate_limiter::ClientRateLimiter;
use crate::application::task_tracker::TaskTracker;
use crate::domain::repository::CredentialRepository;
use platform::clock::Clock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub tasks_swept: usize,
    pub idle_clients: u64,
    pub store_records: u64,
}

pub struct MaintenanceJob<R>
where
    R: CredentialRepository,
{
    repo: Arc<R>,
    tasks: Arc<TaskTracker>,
    limiter: ClientRateLimiter<R>,
    clock: Arc<dyn Clock>,
    config: Arc<CredentialConfig>,
}

impl<R> MaintenanceJob<R>
where
    R: CredentialRepository,
{
    pub fn new(
        repo: Arc<R>,
        tasks: Arc<TaskTracker>,
        limiter: ClientRateLimiter<R>,
        clock: Arc<dyn Clock>,
        config: Arc<CredentialConfig>,
    ) -> Self {
        Self {
            repo,
            tasks,
            limiter,
            clock,
            config,
        }
    }

    pub async fn run_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            tasks_swept: self.tasks.sweep(self.config.task_max_age),
            ..Default::default()
        };

        match self.limiter.purge_idle().await {
            Ok(n) => report.idle_clients = n,
            Err(e) => tracing::warn!(error = %e, "Client window purge failed"),
        }

        match self
            .repo
            .purge_expired(self.clock.now_ms(), self.config.usage_window)
            .await
        {
            Ok(n) => report.store_records = n,
            Err(e) => tracing::warn!(error = %e, "Store purge failed"),
        }

        tracing::debug!(
            tasks_swept = report.tasks_swept,
            idle_clients = report.idle_clients,
            store_records = report.store_records,
            "Maintenance pass finished"
        );
        report
    }

    /// Run forever on `sweep_interval`, starting one interval from now
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
