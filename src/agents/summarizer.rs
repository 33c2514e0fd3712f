//! English summarizer for downloaded articles.

use serde::Deserialize;
use serde_json::json;

use crate::llm::{AgentConfig, ChatSession, Engine, LlmError, StructuredOutput};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

use super::prompts::SUMMARIZER_PROMPT;

pub struct SummarizedArticle {
    pub summary: String,
}

#[derive(Deserialize)]
struct Wire {
    b_summary: String,
}

impl StructuredOutput for SummarizedArticle {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "a_key_facts": { "type": "STRING" },
                "b_summary": { "type": "STRING" }
            },
            "required": ["a_key_facts", "b_summary"]
        })
    }

    fn deserialize(raw: &str) -> Result<Self, LlmError> {
        let wire: Wire = serde_json::from_str(raw)
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        let summary = wire.b_summary.trim().to_string();
        if summary.is_empty() {
            return Err(LlmError::Deserialization("empty summary".to_string()));
        }
        Ok(Self { summary })
    }
}

pub struct Summarizer<'e> {
    session: ChatSession<'e>,
}

impl<'e> Summarizer<'e> {
    pub fn new(engine: &'e dyn Engine, llm: &LlmSettings, session_id: &str) -> Self {
        let config = AgentConfig::for_agent("summarizer", session_id, llm, &llm.light_model, 1.0);
        Self {
            session: ChatSession::new(engine, config, SUMMARIZER_PROMPT.to_string()),
        }
    }

    pub fn summarize(&mut self, shutdown: &Shutdown, article: &str) -> Result<String, LlmError> {
        let summarized: SummarizedArticle = self.session.generate(shutdown, article)?;
        Ok(summarized.summary)
    }
}
