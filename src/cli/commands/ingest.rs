//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::jobs::{IngestRequest, Job, JobId, JobRegistry, JobStatus};
use crate::orchestrator::Orchestrator;
use anyhow::{anyhow, Result};
use indicatif::{MultiProgress, ProgressBar};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the ingest command.
pub async fn run_ingest(
    files: &[PathBuf],
    title: Option<String>,
    update: Option<i64>,
    cancel_after: Option<u64>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&format!("{}", e));
        Output::info("Run 'lectern doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let requests = build_requests(files, title, update)?;

    let orchestrator = Orchestrator::new(settings)?;
    let registry = orchestrator.registry();

    let mut ids = Vec::with_capacity(requests.len());
    for request in requests {
        let title = request.title.clone();
        let id = registry.submit(request).await?;
        Output::info(&format!("Submitted job {} for '{}'", id, title));
        ids.push(id);
    }

    let deadline = cancel_after.map(|secs| Instant::now() + Duration::from_secs(secs));
    let jobs = follow(registry, &ids, deadline).await?;

    println!();
    for job in &jobs {
        Output::job_summary(job);
    }
    println!();

    let mut failed = 0;
    for job in &jobs {
        match (job.status, job.document_id) {
            (JobStatus::Completed, Some(document_id)) => {
                Output::success(&format!("Indexed '{}' as document #{}", job.title, document_id));
            }
            _ => {
                failed += 1;
                let reason = job.error.as_deref().unwrap_or("unknown error");
                Output::error(&format!("Ingestion of '{}' failed: {}", job.title, reason));
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} ingestion job(s) failed", failed, jobs.len()));
    }
    Ok(())
}

/// One request per file. A title or update target only makes sense for a single file.
fn build_requests(
    files: &[PathBuf],
    title: Option<String>,
    update: Option<i64>,
) -> Result<Vec<IngestRequest>> {
    if files.is_empty() {
        return Err(anyhow!("no files given"));
    }
    if files.len() > 1 && (title.is_some() || update.is_some()) {
        return Err(anyhow!("--title and --update apply to a single file"));
    }

    let mut title = title;
    Ok(files
        .iter()
        .map(|file| {
            let title = title.take().unwrap_or_else(|| default_title(file));
            let request = IngestRequest::new(title, absolute(file));
            match update {
                Some(id) => request.updating(id),
                None => request,
            }
        })
        .collect())
}

/// Poll the submitted jobs until all are terminal, one progress bar each.
/// Ctrl-C or the optional deadline requests cancellation of every job still
/// running; polling continues until they actually stop.
async fn follow(
    registry: &JobRegistry,
    ids: &[JobId],
    deadline: Option<Instant>,
) -> Result<Vec<Job>> {
    let bars = MultiProgress::new();
    let progress: HashMap<JobId, ProgressBar> = ids
        .iter()
        .map(|id| (*id, bars.add(Output::job_progress("Queued"))))
        .collect();

    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cancel_sent = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c, if !cancel_sent => {
                cancel_sent = true;
                cancel_all(registry, ids, "interrupted")?;
            }
        }

        if !cancel_sent && deadline.is_some_and(|d| Instant::now() >= d) {
            cancel_sent = true;
            cancel_all(registry, ids, "--cancel-after elapsed")?;
        }

        let jobs = tracked(registry, ids)?;
        for job in &jobs {
            let Some(pb) = progress.get(&job.id) else {
                continue;
            };
            pb.set_position(job.progress as u64);
            if let Some(line) = job.last_log() {
                pb.set_message(format!("{}: {}", job.title, line));
            }
            if job.status.is_terminal() && !pb.is_finished() {
                pb.finish_and_clear();
            }
        }

        if jobs.iter().all(|job| job.status.is_terminal()) {
            return Ok(jobs);
        }
    }
}

/// Snapshots of our jobs, in submission order.
fn tracked(registry: &JobRegistry, ids: &[JobId]) -> Result<Vec<Job>> {
    let jobs: Vec<Job> = registry
        .list_jobs()?
        .into_iter()
        .filter(|job| ids.contains(&job.id))
        .collect();

    if let Some(missing) = ids.iter().find(|id| !jobs.iter().any(|job| job.id == **id)) {
        return Err(anyhow!(
            "job {} was evicted before it could be reported; raise jobs.retention_seconds",
            missing
        ));
    }
    Ok(jobs)
}

fn cancel_all(registry: &JobRegistry, ids: &[JobId], why: &str) -> Result<()> {
    for id in ids {
        let outcome = registry.request_cancel(id)?;
        if outcome.accepted {
            Output::warning(&format!("Cancelling job {} ({}): {}", id, why, outcome.reason));
        }
    }
    Ok(())
}

fn default_title(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| file.display().to_string())
}

fn absolute(file: &Path) -> PathBuf {
    std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_title_uses_file_stem() {
        assert_eq!(default_title(Path::new("/tmp/선형대수_3강.mp4")), "선형대수_3강");
        assert_eq!(default_title(Path::new("lecture")), "lecture");
    }

    #[test]
    fn test_build_requests_per_file() {
        let files = vec![PathBuf::from("/videos/1강.mp4"), PathBuf::from("/videos/2강.mov")];
        let requests = build_requests(&files, None, None).unwrap();

        let titles: Vec<&str> = requests.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["1강", "2강"]);
        assert!(requests.iter().all(|r| r.document_id.is_none()));
    }

    #[test]
    fn test_build_requests_single_file_overrides() {
        let files = vec![PathBuf::from("/videos/1강.mp4")];
        let requests = build_requests(&files, Some("선형대수 1강".into()), Some(7)).unwrap();
        assert_eq!(requests[0].title, "선형대수 1강");
        assert_eq!(requests[0].document_id, Some(7));

        let files = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
        assert!(build_requests(&files, Some("x".into()), None).is_err());
        assert!(build_requests(&files, None, Some(7)).is_err());
        assert!(build_requests(&[], None, None).is_err());
    }
}
