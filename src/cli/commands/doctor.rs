//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::search::FusionWeights;
use crate::store::{Document, DocumentStore, SqliteDocumentStore};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn section(title: &str, checks: Vec<CheckResult>, all: &mut Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &checks {
        check.print();
    }
    println!();
    all.extend(checks);
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Lectern Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    section(
        "External Tools",
        vec![check_tool("ffmpeg", install_hint_ffmpeg()), check_tool("ffprobe", install_hint_ffmpeg())],
        &mut checks,
    );
    section(
        "API Configuration",
        vec![check_openai_api_key(std::env::var("OPENAI_API_KEY").ok().as_deref())],
        &mut checks,
    );
    section("Directories", check_directories(settings), &mut checks);
    section(
        "Configuration",
        vec![check_config_file(), check_weights(settings)],
        &mut checks,
    );
    section("Library", check_library(settings).await, &mut checks);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Lectern.",
            errors
        ));
        return Err(anyhow::anyhow!("{} doctor check(s) failed", errors));
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Lectern is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .chars()
                .take(50)
                .collect::<String>();
            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

fn check_openai_api_key(key: Option<&str>) -> CheckResult {
    match key {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Some("") => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Some(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (name, dir) in [("Data directory", settings.data_dir()), ("Temp directory", settings.temp_dir())] {
        if dir.exists() {
            results.push(CheckResult::ok(name, &dir.display().to_string()));
        } else {
            results.push(CheckResult::warning(
                name,
                &format!("{} (will be created)", dir.display()),
                "Directory will be created on first use",
            ));
        }
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first ingest",
        ));
    }

    results
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: lectern config init",
        )
    }
}

fn check_weights(settings: &Settings) -> CheckResult {
    match FusionWeights::from_settings(&settings.search) {
        Ok(w) => CheckResult::ok(
            "Search weights",
            &format!("bm25 {:.2}, content {:.2}, title {:.2}", w.bm25, w.content, w.title),
        ),
        Err(e) => CheckResult::error(
            "Search weights",
            &e.to_string(),
            "Use non-negative [search] weights with at least one above zero",
        ),
    }
}

async fn check_library(settings: &Settings) -> Vec<CheckResult> {
    let db_path = settings.sqlite_path();
    if !db_path.exists() {
        return Vec::new();
    }

    let documents = match SqliteDocumentStore::new(&db_path) {
        Ok(store) => store.get_all_documents().await,
        Err(e) => Err(e),
    };

    match documents {
        Ok(documents) => vec![
            CheckResult::ok("Documents", &documents.len().to_string()),
            check_dimensions(&documents, settings.embedding.dimensions as usize),
        ],
        Err(e) => vec![CheckResult::error(
            "Documents",
            &format!("unreadable: {}", e),
            "Check the [store] sqlite_path setting",
        )],
    }
}

/// Stored vectors must match the configured embedding size, or vector
/// similarity silently scores them as zero.
fn check_dimensions(documents: &[Document], expected: usize) -> CheckResult {
    let mismatched = documents
        .iter()
        .filter(|d| d.content_embedding.len() != expected || d.title_embedding.len() != expected)
        .count();

    if mismatched == 0 {
        CheckResult::ok("Embedding dimensions", &format!("{} everywhere", expected))
    } else {
        CheckResult::error(
            "Embedding dimensions",
            &format!("{} document(s) not {}-dimensional", mismatched, expected),
            "Re-ingest them with --update, or restore the previous [embedding] settings",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn document(dims: usize) -> Document {
        Document {
            id: 1,
            video_id: None,
            title: "t".to_string(),
            content: "c".to_string(),
            tokenized_text: "c".to_string(),
            title_embedding: vec![0.0; dims],
            content_embedding: vec![0.0; dims],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_api_key_checks() {
        assert_eq!(check_openai_api_key(None).status, CheckStatus::Error);
        assert_eq!(check_openai_api_key(Some("")).status, CheckStatus::Error);
        assert_eq!(check_openai_api_key(Some("abc")).status, CheckStatus::Warning);
        let ok = check_openai_api_key(Some("sk-abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(ok.status, CheckStatus::Ok);
        assert_eq!(ok.message, "configured (sk-abcd...wxyz)");
    }

    #[test]
    fn test_weight_check() {
        let mut settings = Settings::default();
        assert_eq!(check_weights(&settings).status, CheckStatus::Ok);

        settings.search.bm25_weight = -1.0;
        assert_eq!(check_weights(&settings).status, CheckStatus::Error);
    }

    #[test]
    fn test_dimension_check() {
        assert_eq!(check_dimensions(&[document(4)], 4).status, CheckStatus::Ok);
        assert_eq!(check_dimensions(&[], 4).status, CheckStatus::Ok);
        let result = check_dimensions(&[document(4), document(3)], 4);
        assert_eq!(result.status, CheckStatus::Error);
        assert!(result.message.starts_with("1 document(s)"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
