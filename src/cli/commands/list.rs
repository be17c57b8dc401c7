//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let store = orchestrator.store();

    let documents = match store.get_all_documents().await {
        Ok(documents) => documents,
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            return Err(e.into());
        }
    };

    if documents.is_empty() {
        Output::info("No documents indexed yet. Use 'lectern ingest <file>' to add lectures.");
        return Ok(());
    }

    Output::header(&format!("Indexed Documents ({})", documents.len()));
    println!();
    for document in &documents {
        Output::document_line(document);
    }

    let videos = store.list_videos().await?;
    let untranscribed = videos.iter().filter(|v| v.transcript.is_none()).count();

    println!();
    Output::kv("Documents", &documents.len().to_string());
    Output::kv("Videos", &videos.len().to_string());
    if untranscribed > 0 {
        Output::kv("Videos without transcript", &untranscribed.to_string());
    }

    Ok(())
}
