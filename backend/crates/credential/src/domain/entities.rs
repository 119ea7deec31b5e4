//! Domain Entities

use crate::domain::value_objects::IdentityId;
use crate::error::{CredentialError, CredentialResult};
use kernel::id::TaskId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Secret that every identity file must carry
pub const SESSION_SECRET: &str = "sessionid";
/// Secret used as the identity id when present
pub const USER_ID_SECRET: &str = "ds_user_id";
/// Secret echoed in the CSRF header
pub const CSRF_SECRET: &str = "csrftoken";

/// An opaque credential bundle
///
/// Immutable once loaded. The secret map is never logged or serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    /// File the identity was loaded from (without extension)
    pub source_name: String,
    secrets: BTreeMap<String, String>,
}

impl Identity {
    /// Build an identity from its secret map
    ///
    /// The id is the `ds_user_id` secret, or the first 16 hex characters of
    /// SHA-256(`sessionid`) when the user id is missing.
    pub fn from_secrets(
        source_name: impl Into<String>,
        secrets: BTreeMap<String, String>,
    ) -> CredentialResult<Self> {
        let source_name = source_name.into();
        let session = secrets
            .get(SESSION_SECRET)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                CredentialError::InvalidIdentity(format!(
                    "{source_name}: missing {SESSION_SECRET}"
                ))
            })?;

        let id = match secrets.get(USER_ID_SECRET).map(|v| v.trim()) {
            Some(user_id) if !user_id.is_empty() => user_id.to_string(),
            _ => platform::crypto::sha256_hex(session.as_bytes())[..16].to_string(),
        };

        Ok(Self {
            id: IdentityId::new(id),
            source_name,
            secrets,
        })
    }

    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

    /// All secrets as `(name, value)` pairs, for the outbound cookie header
    pub fn secret_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.secrets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn secrets(&self) -> &BTreeMap<String, String> {
        &self.secrets
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("source_name", &self.source_name)
            .field("secrets", &format_args!("<{} redacted>", self.secrets.len()))
            .finish()
    }
}

/// Per-identity health counters
///
/// `successes` and `challenges` never decrease. `rate_limits` reads as zero
/// once its 24h expiry has passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub successes: u64,
    pub challenges: u64,
    pub rate_limits: u64,
    pub last_success_at_ms: Option<i64>,
    pub last_challenge_at_ms: Option<i64>,
    pub last_used_at_ms: Option<i64>,
}

impl HealthRecord {
    /// Recorded outcomes that carry trust signal
    pub fn observations(&self) -> u64 {
        self.successes.saturating_add(self.challenges)
    }
}

/// Observability view of one identity. Never includes secrets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    pub id: IdentityId,
    pub source_name: String,
    pub health: HealthRecord,
    pub cooldown_until_ms: Option<i64>,
    pub used_in_window: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

/// Failure recorded on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub kind: String,
    pub message: String,
}

impl From<&CredentialError> for TaskError {
    fn from(err: &CredentialError) -> Self {
        Self {
            kind: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

/// Final outcome written to a task exactly once
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed(serde_json::Value),
    Failed(TaskError),
}

/// Handle a caller polls for an asynchronous result
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskError>,
    pub created_at_ms: i64,
    pub finished_at_ms: Option<i64>,
}

impl Task {
    pub fn new(now_ms: i64) -> Self {
        Self {
            id: TaskId::new(),
            status: TaskStatus::Processing,
            result: None,
            error: None,
            created_at_ms: now_ms,
            finished_at_ms: None,
        }
    }

    /// Apply the final outcome. Returns false if the task already finished.
    pub fn finish(&mut self, outcome: TaskOutcome, now_ms: i64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            TaskOutcome::Completed(value) => {
                self.status = TaskStatus::Completed;
                self.result = Some(value);
            }
            TaskOutcome::Failed(error) => {
                self.status = TaskStatus::Failed;
                self.error = Some(error);
            }
        }
        self.finished_at_ms = Some(now_ms);
        true
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.created_at_ms)
    }
}
