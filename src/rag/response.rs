//! Answer generation.

use super::context::{format_context_for_prompt, format_sources_for_display};
use crate::config::{AnswerPrompts, AnswerSettings, Prompts};
use crate::error::{LecternError, Result};
use crate::openai::create_client;
use crate::search::{HybridScorer, ScoredResult};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant lectures in the library for this question.";

/// Retrieves documents and asks a chat model to answer from them.
#[derive(Clone)]
pub struct AnswerAssembler {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    scorer: Arc<HybridScorer>,
    model: String,
    language: String,
    max_documents: usize,
    prompts: AnswerPrompts,
}

impl AnswerAssembler {
    pub fn new(scorer: Arc<HybridScorer>, settings: &AnswerSettings) -> Self {
        Self {
            client: create_client(),
            scorer,
            model: settings.model.clone(),
            language: settings.language.clone(),
            max_documents: settings.max_documents.max(1),
            prompts: AnswerPrompts::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: AnswerPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Answer `question` from the top `top_k` documents (capped at the
    /// configured maximum).
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        let limit = top_k.unwrap_or(self.max_documents).min(self.max_documents);
        let outcome = self.scorer.search(question, Some(limit)).await?;

        if outcome.results.is_empty() {
            info!("No documents to answer from");
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let messages = self.build_messages(question, &outcome.results)?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| LecternError::Answer(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LecternError::OpenAI(format!("Failed to generate answer: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LecternError::Answer("Empty response from model".to_string()))?;

        debug!("Answered from {} documents", outcome.results.len());

        Ok(Answer {
            answer,
            sources: outcome.results,
        })
    }

    fn build_messages(
        &self,
        question: &str,
        results: &[ScoredResult],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut vars = HashMap::new();
        vars.insert("question", question.to_string());
        vars.insert("context", format_context_for_prompt(results));
        vars.insert("language", self.language.clone());

        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.system.clone())
                .build()
                .map_err(|e| LecternError::Answer(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Prompts::render(&self.prompts.user, &vars))
                .build()
                .map_err(|e| LecternError::Answer(e.to_string()))?
                .into(),
        ])
    }
}

/// A generated answer and the documents it was drawn from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<ScoredResult>,
}

impl Answer {
    /// Format the answer followed by its sources.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();
        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            output.push_str(&format_sources_for_display(&self.sources));
        }
        output
    }
}
