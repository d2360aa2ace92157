use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Full or partial status refresh
    Initdb,
    /// Force refresh of one city's status
    UpdateCity,
    /// Prepare editable data, generating it if needed
    JosmData,
    /// Return editable data that is already fresh
    JosmDataFast,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Initdb => "task_initdb",
            JobKind::UpdateCity => "task_update_insee",
            JobKind::JosmData => "task_josm_data",
            JobKind::JosmDataFast => "task_josm_data_fast",
        }
    }
}

/// Logical identity of a job: two submissions with equal keys are the same work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub kind: JobKind,
    pub args: Vec<String>,
}

impl JobKey {
    pub fn new(kind: JobKind, args: Vec<String>) -> Self {
        Self { kind, args }
    }

    pub fn single(kind: JobKind, arg: impl Into<String>) -> Self {
        Self::new(kind, vec![arg.into()])
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Queued, waiting for a worker
    Pending,
    /// Running, progress is being reported
    Progress,
    Success,
    Failure,
}

impl JobState {
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Progress)
    }
}

/// Snapshot of a job as seen by pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub key: JobKey,
    pub state: JobState,
    /// 0 to 100
    pub progress: f64,
    /// Job output on success, `{"error": ...}` on failure
    pub result: Option<serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn pending(id: JobId, key: JobKey) -> Self {
        Self {
            id,
            key,
            state: JobState::Pending,
            progress: 0.0,
            result: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Progress
    }
}
