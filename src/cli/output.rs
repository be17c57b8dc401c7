//! CLI output formatting utilities.

use crate::jobs::{Job, JobStatus};
use crate::search::ScoredResult;
use crate::store::Document;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one line of a document listing.
    pub fn document_line(document: &Document) {
        let tokens = document.tokens().count();
        println!(
            "  {} {} ({}, {} tokens, updated {})",
            style("*").cyan(),
            style(&document.title).bold(),
            style(format!("#{}", document.id)).dim(),
            tokens,
            document.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    /// Print one ranked result with its per-signal breakdown.
    pub fn search_result(rank: usize, result: &ScoredResult) {
        println!(
            "\n{} {} {} (score: {:.3})",
            style(format!("[{}]", rank)).green(),
            style(&result.document.title).bold(),
            style(format!("#{}", result.document.id)).dim(),
            result.score
        );
        let mut signals = format!(
            "bm25 {:.3} | content {:.3} | title {:.3}",
            result.normalized.bm25, result.normalized.content_sim, result.normalized.title_sim
        );
        if let Some(rerank) = result.rerank_score {
            signals.push_str(&format!(" | rerank {:.2}", rerank));
        }
        println!("   {}", style(signals).dim());
        println!("   {}", content_preview(&result.document.content, 200));
    }

    /// Print a job's status line and its log trail.
    pub fn job_summary(job: &Job) {
        let status = match job.status {
            JobStatus::Completed => style(job.status.to_string()).green().bold(),
            JobStatus::Failed => style(job.status.to_string()).red().bold(),
            _ => style(job.status.to_string()).yellow(),
        };
        println!("  {} {} ({}%)", style(job.id.to_string()).dim(), status, job.progress);
        for line in &job.log {
            println!("    {} {}", style("|").dim(), line);
        }
    }

    /// Create a percent progress bar for a job.
    pub fn job_progress(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten newlines and truncate on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
