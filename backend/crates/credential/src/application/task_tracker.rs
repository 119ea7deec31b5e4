//! Ephemeral Task Tracker
//!
//! Process-local handles for polling asynchronous results. Lost on restart.

use crate::domain::entities::{Task, TaskOutcome};
use crate::error::{CredentialError, CredentialResult};
use dashmap::DashMap;
use kernel::id::TaskId;
use platform::clock::{Clock, duration_ms};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct TaskTracker {
    tasks: DashMap<TaskId, Task>,
    clock: Arc<dyn Clock>,
}

impl TaskTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: DashMap::new(),
            clock,
        }
    }

    /// Register a new task in `processing`
    pub fn create(&self) -> TaskId {
        let task = Task::new(self.clock.now_ms());
        let id = task.id;
        self.tasks.insert(id, task);
        id
    }

    /// Write the final outcome. Returns false if the task is unknown (already
    /// swept) or finished earlier.
    pub fn update(&self, id: TaskId, outcome: TaskOutcome) -> bool {
        let now_ms = self.clock.now_ms();
        match self.tasks.get_mut(&id) {
            Some(mut task) => task.finish(outcome, now_ms),
            None => {
                tracing::debug!(task_id = %id, "Outcome for unknown task dropped");
                false
            }
        }
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.get(&id).map(|t| t.clone())
    }

    /// Current state of a task for a polling caller
    pub fn poll(&self, id: TaskId) -> CredentialResult<Task> {
        self.get(id).ok_or(CredentialError::TaskNotFound)
    }

    /// Drop tasks created more than `max_age` ago. Returns how many were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now_ms = self.clock.now_ms();
        let max_age_ms = duration_ms(max_age);
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.age_ms(now_ms) <= max_age_ms);
        let removed = before.saturating_sub(self.tasks.len());
        if removed > 0 {
            tracing::info!(removed, remaining = self.tasks.len(), "Swept expired tasks");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{TaskError, TaskStatus};
    use platform::clock::ManualClock;

    fn tracker() -> (Arc<ManualClock>, TaskTracker) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (clock.clone(), TaskTracker::new(clock))
    }

    #[test]
    fn test_create_and_get() {
        let (_, tracker) = tracker();
        let id = tracker.create();
        let task = tracker.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.result.is_none());
        assert!(tracker.get(TaskId::new()).is_none());
        assert!(matches!(
            tracker.poll(TaskId::new()),
            Err(CredentialError::TaskNotFound)
        ));
    }

    #[test]
    fn test_update_is_visible_and_single_shot() {
        let (_, tracker) = tracker();
        let id = tracker.create();

        assert!(tracker.update(id, TaskOutcome::Completed(serde_json::json!({"n": 1}))));
        let failed = TaskOutcome::Failed(TaskError {
            kind: "internal".into(),
            message: "late".into(),
        });
        assert!(!tracker.update(id, failed));

        let task = tracker.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(serde_json::json!({"n": 1})));
    }

    #[test]
    fn test_update_unknown_task() {
        let (_, tracker) = tracker();
        assert!(!tracker.update(TaskId::new(), TaskOutcome::Completed(serde_json::Value::Null)));
    }

    #[test]
    fn test_sweep_removes_only_old_tasks() {
        let (clock, tracker) = tracker();
        let old = tracker.create();
        clock.advance(Duration::from_secs(20 * 60));
        let fresh = tracker.create();
        clock.advance(Duration::from_secs(11 * 60));

        assert_eq!(tracker.sweep(Duration::from_secs(30 * 60)), 1);
        assert!(tracker.get(old).is_none());
        assert!(tracker.get(fresh).is_some());
    }
}
