//! LLM relevance reranking.
//!
//! Each candidate gets an independent yes/no relevance judgment which is then
//! blended with its fused score. The blend trusts the fused score more near
//! the top of the list:
//!
//! | rank  | fused | rerank |
//! |-------|-------|--------|
//! | 1-3   | 0.75  | 0.25   |
//! | 4-10  | 0.60  | 0.40   |
//! | 11+   | 0.40  | 0.60   |

use super::fusion::rank_order;
use super::ScoredResult;
use crate::config::{Prompts, RerankPrompts};
use crate::error::{LecternError, Result};
use crate::openai::create_client_with_timeout;
use crate::store::Document;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const MAX_CONCURRENT_JUDGMENTS: usize = 4;
const EXCERPT_CHARS: usize = 800;

/// Judges how relevant one document is to a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Relevance in `[0, 1]`.
    async fn relevance(&self, query: &str, document: &Document) -> Result<f64>;
}

/// Chat-completion based relevance judge.
pub struct LlmReranker {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: RerankPrompts,
}

impl LlmReranker {
    pub fn new(model: &str, prompts: RerankPrompts, timeout: Duration) -> Self {
        Self {
            client: create_client_with_timeout(timeout),
            model: model.to_string(),
            prompts,
        }
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    #[instrument(skip(self, document), fields(document_id = document.id))]
    async fn relevance(&self, query: &str, document: &Document) -> Result<f64> {
        let mut vars = HashMap::new();
        vars.insert("query", query.to_string());
        vars.insert("title", document.title.clone());
        vars.insert("excerpt", document.excerpt(EXCERPT_CHARS));
        let user_prompt = Prompts::render(&self.prompts.user, &vars);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(self.prompts.system.clone())
                    .build()
                    .map_err(|e| LecternError::OpenAI(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| LecternError::OpenAI(e.to_string()))?
                    .into(),
            ])
            .temperature(0.0)
            .max_completion_tokens(50u32)
            .build()
            .map_err(|e| LecternError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LecternError::OpenAI(format!("Rerank call failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(parse_relevance(&content))
    }
}

#[derive(Deserialize)]
struct RelevanceResponse {
    relevant: bool,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Turn a judgment into a score: JSON first, then embedded JSON, then keywords.
fn parse_relevance(content: &str) -> f64 {
    let from_json = |v: RelevanceResponse| {
        let base = if v.relevant { 0.5 } else { 0.0 };
        base + v.confidence.clamp(0.0, 1.0) * 0.5
    };

    if let Ok(v) = serde_json::from_str::<RelevanceResponse>(content) {
        return from_json(v);
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<RelevanceResponse>(&content[start..=end]) {
                return from_json(v);
            }
        }
    }

    let lower = content.to_lowercase();
    let has_word = |word: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == word)
    };
    if lower.contains("\"relevant\": true") || has_word("yes") {
        0.7
    } else if lower.contains("\"relevant\": false") || has_word("no") {
        0.2
    } else {
        0.5
    }
}

/// Blend weights `(fused, rerank)` for a zero-based rank.
fn blend_weights(rank: usize) -> (f64, f64) {
    if rank < 3 {
        (0.75, 0.25)
    } else if rank < 10 {
        (0.60, 0.40)
    } else {
        (0.40, 0.60)
    }
}

/// Re-score the first `candidates` results and re-sort the whole list.
///
/// Candidates whose judgment fails keep their fused score.
pub async fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    results: &mut [ScoredResult],
    candidates: usize,
) {
    let n = results.len().min(candidates);
    if n == 0 {
        return;
    }

    let judgments: Vec<Result<f64>> = stream::iter(results[..n].iter())
        .map(|result| reranker.relevance(query, &result.document))
        .buffered(MAX_CONCURRENT_JUDGMENTS)
        .collect()
        .await;

    for (rank, (result, judgment)) in results.iter_mut().zip(judgments).enumerate() {
        match judgment {
            Ok(relevance) => {
                let (fused_w, rerank_w) = blend_weights(rank);
                result.rerank_score = Some(relevance);
                result.score = fused_w * result.fused_score + rerank_w * relevance;
            }
            Err(e) => warn!(document_id = result.document.id, "Rerank judgment failed: {}", e),
        }
    }

    results.sort_by(|a, b| rank_order((a.score, a.document.id), (b.score, b.document.id)));
    debug!("Reranked {} candidates", n);
}
