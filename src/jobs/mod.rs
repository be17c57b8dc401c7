//! Background ingestion jobs.
//!
//! [`JobRegistry`] owns the process-wide job table and hands each submitted
//! item to the [`IngestionPipeline`] on its own task. Callers poll snapshots
//! with [`JobRegistry::get_status`] and stop work with
//! [`JobRegistry::request_cancel`].

mod pipeline;
mod registry;

pub use pipeline::{IngestionPipeline, SourcePolicy};
pub use registry::{JobHandle, JobRegistry};

use crate::error::LecternError;
use crate::store::{DocumentId, VideoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

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
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = LecternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| LecternError::InvalidInput(format!("invalid job id '{}': {}", s, e)))
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only transitions. `Pending -> Failed` covers jobs cancelled
    /// before they were admitted to a worker slot.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// What to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub title: String,
    pub source_path: PathBuf,
    /// Re-ingest into this existing document instead of creating one.
    pub document_id: Option<DocumentId>,
}

impl IngestRequest {
    pub fn new(title: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            source_path: source_path.into(),
            document_id: None,
        }
    }

    pub fn updating(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }
}

/// Snapshot of a job's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Video record created on submission.
    pub video_id: VideoId,
    pub title: String,
    pub source_path: PathBuf,
    pub status: JobStatus,
    /// Percent complete, never decreasing.
    pub progress: u8,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Human-readable trail of what happened, oldest first.
    pub log: Vec<String>,
    pub cancel_requested: bool,
    /// Document written or updated by a completed job.
    pub document_id: Option<DocumentId>,
    /// Cause of failure.
    pub error: Option<String>,
}

impl Job {
    fn new(id: JobId, video_id: VideoId, request: &IngestRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            video_id,
            title: request.title.clone(),
            source_path: request.source_path.clone(),
            status: JobStatus::Pending,
            progress: 0,
            submitted_at: now,
            started_at: None,
            last_update: now,
            finished_at: None,
            log: vec![format!("Job submitted: {}", request.title)],
            cancel_requested: false,
            document_id: None,
            error: None,
        }
    }

    /// Most recent log line.
    pub fn last_log(&self) -> Option<&str> {
        self.log.last().map(String::as_str)
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    pub accepted: bool,
    pub reason: String,
}

impl CancelOutcome {
    fn accepted(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_only_move_forward() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_ingest_request_builder() {
        let request = IngestRequest::new("강의", "/tmp/a.mp4").updating(7);
        assert_eq!(request.document_id, Some(7));
        assert_eq!(request.source_path, PathBuf::from("/tmp/a.mp4"));
    }
}
