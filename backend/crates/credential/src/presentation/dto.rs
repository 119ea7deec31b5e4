//! API DTOs (Data Transfer Objects)

use crate::application::credential_store::ReloadSummary;
use crate::domain::entities::{IdentitySnapshot, Task, TaskError, TaskStatus};
use kernel::id::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request for POST /api/download
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// Response for POST /api/download
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadAccepted {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Response for GET /api/status/{task_id}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

fn rfc3339(ms: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(ms).map(|t| t.to_rfc3339())
}

impl From<Task> for TaskStatusResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            result: task.result,
            error: task.error,
            created_at: rfc3339(task.created_at_ms),
            finished_at: task.finished_at_ms.and_then(rfc3339),
        }
    }
}

/// Request for POST /api/admin/identities
#[derive(Debug, Clone, Deserialize)]
pub struct AddIdentityRequest {
    pub name: String,
    pub secrets: BTreeMap<String, String>,
}

/// Response for GET /api/admin/identities
#[derive(Debug, Clone, Serialize)]
pub struct IdentitiesResponse {
    pub count: usize,
    pub identities: Vec<IdentitySnapshot>,
}

/// Response for admin operations that reload the pool
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub identities: usize,
    pub new_records: u64,
}

impl From<ReloadSummary> for ReloadResponse {
    fn from(summary: ReloadSummary) -> Self {
        Self {
            identities: summary.identities,
            new_records: summary.new_records,
        }
    }
}
