//! Process-wide job table with status polling and cancellation.

use super::{CancelOutcome, IngestRequest, IngestionPipeline, Job, JobId, JobStatus};
use crate::config::JobSettings;
use crate::error::{LecternError, Result};
use crate::store::{DocumentId, DocumentStore};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, instrument, warn};

struct JobEntry {
    job: Job,
    /// Submission order, for stable listing.
    seq: u64,
    /// Dropped once the job is terminal.
    cancel_tx: Option<watch::Sender<bool>>,
    status_tx: watch::Sender<JobStatus>,
}

#[derive(Default)]
struct JobTable {
    entries: Mutex<HashMap<JobId, JobEntry>>,
}

impl JobTable {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<JobId, JobEntry>>> {
        self.entries
            .lock()
            .map_err(|e| LecternError::Registry(format!("Failed to acquire lock: {}", e)))
    }

    /// Mutate one entry under a single lock acquisition.
    fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut JobEntry) -> R) -> Result<R> {
        let mut entries = self.lock()?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| LecternError::NotFound(format!("job {}", id)))?;
        let result = f(entry);
        entry.job.last_update = Utc::now();
        Ok(result)
    }
}

/// Write access to one job, held by the task running it.
pub struct JobHandle {
    id: JobId,
    table: Arc<JobTable>,
    cancel_rx: watch::Receiver<bool>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn is_cancel_requested(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Stage boundary check.
    pub fn checkpoint(&self, stage: &str) -> Result<()> {
        if self.is_cancel_requested() {
            return Err(LecternError::Cancelled(format!(
                "cancellation requested before {}",
                stage
            )));
        }
        Ok(())
    }

    /// Resolves when cancellation is requested; never resolves once the job
    /// has released its token.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        if rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run an external call under a deadline, aborting it on cancellation.
    pub async fn bounded<T, F>(&self, operation: &str, limit: Duration, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(LecternError::Cancelled(format!("{} aborted", operation))),
            result = tokio::time::timeout(limit, call) => match result {
                Ok(result) => result,
                Err(_) => Err(LecternError::Timeout {
                    operation: operation.to_string(),
                    limit,
                }),
            },
        }
    }

    /// Pending -> Processing.
    pub fn start(&self) {
        self.transition(JobStatus::Processing, |job| {
            job.started_at = Some(Utc::now());
            job.log.push("Processing started".to_string());
        });
    }

    /// Raise progress and append a log line in one step.
    pub fn advance(&self, progress: u8, message: impl Into<String>) {
        let message = message.into();
        self.record(|entry| {
            entry.job.progress = entry.job.progress.max(progress.min(100));
            entry.job.log.push(message);
        });
    }

    /// Append a log line without touching progress.
    pub fn note(&self, message: impl Into<String>) {
        let message = message.into();
        self.record(|entry| entry.job.log.push(message));
    }

    /// Processing -> Completed.
    pub fn complete(&self, document_id: DocumentId, message: impl Into<String>) {
        let message = message.into();
        self.transition(JobStatus::Completed, |job| {
            job.progress = 100;
            job.document_id = Some(document_id);
            job.log.push(message);
        });
    }

    /// Any non-terminal state -> Failed.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.transition(JobStatus::Failed, |job| {
            job.error = Some(message.clone());
            job.log.push(message);
        });
    }

    fn record(&self, f: impl FnOnce(&mut JobEntry)) {
        if let Err(e) = self.table.update(&self.id, f) {
            warn!(job_id = %self.id, "Failed to update job: {}", e);
        }
    }

    fn transition(&self, next: JobStatus, f: impl FnOnce(&mut Job)) {
        self.record(|entry| {
            let current = entry.job.status;
            if !current.can_transition_to(next) {
                warn!(job_id = %entry.job.id, "Ignoring transition {} -> {}", current, next);
                return;
            }

            entry.job.status = next;
            f(&mut entry.job);
            if next.is_terminal() {
                entry.job.finished_at = Some(Utc::now());
                entry.cancel_tx = None;
            }
            entry.status_tx.send_replace(next);
        });
    }
}

/// Tracks ingestion jobs and runs each on its own task.
#[derive(Clone)]
pub struct JobRegistry {
    table: Arc<JobTable>,
    pipeline: Arc<IngestionPipeline>,
    store: Arc<dyn DocumentStore>,
    permits: Arc<Semaphore>,
    retention: chrono::Duration,
    next_seq: Arc<std::sync::atomic::AtomicU64>,
}

impl JobRegistry {
    pub fn new(
        pipeline: Arc<IngestionPipeline>,
        store: Arc<dyn DocumentStore>,
        settings: &JobSettings,
    ) -> Self {
        Self {
            table: Arc::new(JobTable::default()),
            pipeline,
            store,
            permits: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            retention: chrono::Duration::seconds(settings.retention_seconds as i64),
            next_seq: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    /// Register a job and start it in the background.
    ///
    /// Records the video metadata before returning; all pipeline work happens
    /// on a spawned task and its failures land in the job record.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn submit(&self, request: IngestRequest) -> Result<JobId> {
        self.prune_expired()?;

        let video = self
            .store
            .create_video(&request.title, &request.source_path.to_string_lossy())
            .await?;

        let id = JobId::new();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, _) = watch::channel(JobStatus::Pending);
        let seq = self
            .next_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        self.table.lock()?.insert(
            id,
            JobEntry {
                job: Job::new(id, video.id, &request),
                seq,
                cancel_tx: Some(cancel_tx),
                status_tx,
            },
        );

        let handle = JobHandle {
            id,
            table: Arc::clone(&self.table),
            cancel_rx,
        };
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = handle.cancelled() => {
                    handle.fail("cancelled: cancellation requested before start");
                    return;
                }
                permit = permits.acquire_owned() => permit,
            };

            let _permit = match permit {
                Ok(permit) => permit,
                Err(e) => {
                    handle.fail(format!("Worker pool unavailable: {}", e));
                    return;
                }
            };

            pipeline.run(&handle, request, video.id).await;
        });

        info!(job_id = %id, "Submitted ingestion job");
        Ok(id)
    }

    /// Snapshot of a job.
    pub fn get_status(&self, id: &JobId) -> Result<Job> {
        self.table
            .lock()?
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| LecternError::NotFound(format!("job {}", id)))
    }

    /// Ask a running job to stop. Terminal jobs reject the request.
    #[instrument(skip(self))]
    pub fn request_cancel(&self, id: &JobId) -> Result<CancelOutcome> {
        self.table.update(id, |entry| {
            let status = entry.job.status;
            if status.is_terminal() {
                return CancelOutcome::rejected(format!("job already {}", status));
            }
            if entry.job.cancel_requested {
                return CancelOutcome::accepted("cancellation already requested");
            }

            entry.job.cancel_requested = true;
            entry.job.log.push("Cancellation requested".to_string());
            if let Some(tx) = &entry.cancel_tx {
                tx.send_replace(true);
            }

            debug!("Cancellation signalled");
            CancelOutcome::accepted("cancellation requested")
        })
    }

    /// All tracked jobs, in submission order. Expired jobs stay listed until
    /// the next submit or an explicit prune.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let entries = self.table.lock()?;
        let mut jobs: Vec<(u64, Job)> = entries
            .values()
            .map(|entry| (entry.seq, entry.job.clone()))
            .collect();
        jobs.sort_by_key(|(seq, _)| *seq);
        Ok(jobs.into_iter().map(|(_, job)| job).collect())
    }

    /// Wait until the job reaches a terminal state and return its final snapshot.
    pub async fn wait(&self, id: &JobId) -> Result<Job> {
        let mut rx = self
            .table
            .lock()?
            .get(id)
            .map(|entry| entry.status_tx.subscribe())
            .ok_or_else(|| LecternError::NotFound(format!("job {}", id)))?;

        rx.wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| LecternError::NotFound(format!("job {} was evicted", id)))?;

        self.get_status(id)
    }

    /// Evict terminal jobs older than the retention window. Returns how many went.
    pub fn prune_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let retention = self.retention;

        let mut entries = self.table.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| match entry.job.finished_at {
            Some(finished) if entry.job.status.is_terminal() => now - finished < retention,
            _ => true,
        });

        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Evicted {} expired jobs", evicted);
        }
        Ok(evicted)
    }
}
