//! Prompt templates for Lectern.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub answer: AnswerPrompts,
    pub rerank: RerankPrompts,
}

/// Prompts for answer generation over retrieved lectures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You answer questions about recorded lectures using only the transcripts you are given.
If the transcripts do not contain the answer, say so plainly."#
                .to_string(),

            user: r#"The following documents were retrieved from the lecture library:

{{context}}

Answer this question based on the documents above:
{{question}}

Write the answer in {{language}}. Be specific and cite document titles where they support the answer."#
                .to_string(),
        }
    }
}

/// Prompts for LLM relevance reranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankPrompts {
    pub system: String,
    pub user: String,
}

impl Default for RerankPrompts {
    fn default() -> Self {
        Self {
            system: r#"Judge whether a lecture transcript excerpt is relevant to a search query.
Answer with ONLY a JSON object: {"relevant": true/false, "confidence": 0.0-1.0}"#
                .to_string(),

            user: r#"Query: {{query}}

Title: {{title}}
Excerpt:
{{excerpt}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, overriding defaults with files from `custom_dir` when present.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }

            let rerank_path = custom_path.join("rerank.toml");
            if rerank_path.exists() {
                let content = std::fs::read_to_string(&rerank_path)?;
                prompts.rerank = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.answer.user.contains("{{question}}"));
        assert!(prompts.rerank.user.contains("{{excerpt}}"));
    }

    #[test]
    fn test_render_template() {
        let mut vars = HashMap::new();
        vars.insert("name", "Alice".to_string());
        vars.insert("count", "5".to_string());

        let result = Prompts::render("Hello {{name}}, you have {{count}} messages.", &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_dir_overrides_answer_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("answer.toml"),
            "system = \"custom\"\nuser = \"{{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str()).unwrap();
        assert_eq!(prompts.answer.system, "custom");
        assert!(!prompts.rerank.system.is_empty());
    }
}
