//! Submit Download Use Case
//!
//! Admits the caller, validates the target, creates a task and runs the
//! retry orchestration in the background.

use crate::application::rate_limiter::ClientRateLimiter;
use crate::application::retry::RetryOrchestrator;
use crate::application::task_tracker::TaskTracker;
use crate::domain::entities::{Identity, TaskError, TaskOutcome};
use crate::domain::repository::{CredentialRepository, PlatformClient};
use crate::domain::value_objects::TargetRef;
use crate::error::CredentialResult;
use kernel::id::TaskId;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Output of a submission
#[derive(Debug)]
pub struct SubmittedTask {
    pub task_id: TaskId,
    /// Background orchestration; dropping it does not cancel the work
    pub handle: JoinHandle<()>,
}

pub struct SubmitDownloadUseCase<R, P>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
{
    limiter: ClientRateLimiter<R>,
    orchestrator: RetryOrchestrator<R>,
    platform: Arc<P>,
    tasks: Arc<TaskTracker>,
}

impl<R, P> SubmitDownloadUseCase<R, P>
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
{
    pub fn new(
        limiter: ClientRateLimiter<R>,
        orchestrator: RetryOrchestrator<R>,
        platform: Arc<P>,
        tasks: Arc<TaskTracker>,
    ) -> Self {
        Self {
            limiter,
            orchestrator,
            platform,
            tasks,
        }
    }

    pub async fn execute(&self, client_key: &str, url: &str) -> CredentialResult<SubmittedTask> {
        // Over-quota callers never reach the identity pool
        self.limiter.check(client_key).await?;

        let target = TargetRef::parse(url)?;
        let task_id = self.tasks.create();

        tracing::info!(
            task_id = %task_id,
            client = %client_key,
            target = %target,
            "Download task accepted"
        );

        let handle = tokio::spawn(run_task(
            task_id,
            target,
            self.orchestrator.clone(),
            self.platform.clone(),
            self.tasks.clone(),
        ));

        Ok(SubmittedTask {
            task_id,
            handle,
        })
    }
}

async fn run_task<R, P>(
    task_id: TaskId,
    target: TargetRef,
    orchestrator: RetryOrchestrator<R>,
    platform: Arc<P>,
    tasks: Arc<TaskTracker>,
) where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
{
    let result = orchestrator
        .execute(|identity: Identity| {
            let platform = platform.clone();
            let target = target.clone();
            async move { platform.fetch(&identity, &target).await }
        })
        .await;

    let outcome = match result {
        Ok(data) => {
            tracing::info!(task_id = %task_id, target = %target, "Download task completed");
            TaskOutcome::Completed(serde_json::json!({
                "kind": target.kind,
                "shortcode": target.shortcode,
                "data": data,
            }))
        }
        Err(err) => {
            tracing::warn!(
                task_id = %task_id,
                target = %target,
                error = %err,
                "Download task failed"
            );
            TaskOutcome::Failed(TaskError::from(&err))
        }
    };

    tasks.update(task_id, outcome);
}
