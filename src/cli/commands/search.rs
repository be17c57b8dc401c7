//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, top_k: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let outcome = orchestrator.scorer().search(query, top_k).await;
    spinner.finish_and_clear();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if outcome.results.is_empty() {
        Output::warning("No documents indexed yet. Use 'lectern ingest <file>' to add lectures.");
        return Ok(());
    }

    Output::success(&format!(
        "Found {} results in {:.1}ms",
        outcome.results.len(),
        outcome.query_latency.as_secs_f64() * 1000.0
    ));
    let weights = *orchestrator.scorer().weights();
    Output::kv(
        "weights",
        &format!(
            "bm25 {:.2} | content {:.2} | title {:.2}",
            weights.bm25, weights.content, weights.title
        ),
    );
    for (i, result) in outcome.results.iter().enumerate() {
        Output::search_result(i + 1, result);
    }

    Ok(())
}
