//! Show and delete command implementations.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::store::DocumentId;
use anyhow::Result;

/// Print a document and the video it came from.
pub async fn run_show(id: DocumentId, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let store = orchestrator.store();

    let Some(document) = store.get_document(id).await? else {
        Output::error(&format!("Document #{} not found", id));
        return Err(anyhow::anyhow!("document {} not found", id));
    };

    Output::header(&document.title);
    Output::kv("Id", &document.id.to_string());
    Output::kv("Created", &document.created_at.to_rfc3339());
    Output::kv("Updated", &document.updated_at.to_rfc3339());
    Output::kv("Tokens", &document.tokens().count().to_string());
    Output::kv(
        "Embeddings",
        &format!(
            "title {}d, content {}d",
            document.title_embedding.len(),
            document.content_embedding.len()
        ),
    );

    if let Some(video_id) = document.video_id {
        if let Some(video) = store.get_video(video_id).await? {
            Output::kv("Source", &video.file_path);
        }
    }

    println!("\n{}", document.content);
    Ok(())
}

/// Delete a document.
pub async fn run_delete(id: DocumentId, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    if orchestrator.store().delete_document(id).await? {
        Output::success(&format!("Deleted document #{}", id));
        Ok(())
    } else {
        Output::error(&format!("Document #{} not found", id));
        Err(anyhow::anyhow!("document {} not found", id))
    }
}
