//! Namer: proposes a fresh category for an article.

use serde::Deserialize;
use serde_json::json;

use crate::llm::{AgentConfig, ChatSession, Engine, LlmError, StructuredOutput};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

use super::prompts::NAMER_PROMPT;

#[derive(Debug, Clone)]
pub struct NamedCategory {
    pub category: String,
    pub description: String,
}

#[derive(Deserialize)]
struct Wire {
    b_category: String,
    c_category_description: String,
}

impl StructuredOutput for NamedCategory {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "a_reasoning": { "type": "STRING" },
                "b_category": { "type": "STRING" },
                "c_category_description": { "type": "STRING" }
            },
            "required": ["a_reasoning", "b_category", "c_category_description"]
        })
    }

    fn deserialize(raw: &str) -> Result<Self, LlmError> {
        let wire: Wire = serde_json::from_str(raw)
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        let category = wire.b_category.trim().to_lowercase();
        if category.is_empty() {
            return Err(LlmError::Deserialization("empty category name".to_string()));
        }
        Ok(Self {
            category,
            description: wire.c_category_description.trim().to_string(),
        })
    }
}

pub struct Namer<'e> {
    session: ChatSession<'e>,
}

impl<'e> Namer<'e> {
    pub fn new(engine: &'e dyn Engine, llm: &LlmSettings, session_id: &str) -> Self {
        let config = AgentConfig::for_agent("namer", session_id, llm, &llm.basic_model, 0.4);
        Self {
            session: ChatSession::new(engine, config, NAMER_PROMPT.to_string()),
        }
    }

    pub fn propose(
        &mut self,
        shutdown: &Shutdown,
        article: &str,
    ) -> Result<NamedCategory, LlmError> {
        self.session.generate(shutdown, article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_normalizes_name() {
        let named = NamedCategory::deserialize(
            r#"{"a_reasoning": "...", "b_category": " Salud ", "c_category_description": "Health news "}"#,
        )
        .unwrap();
        assert_eq!(named.category, "salud");
        assert_eq!(named.description, "Health news");
    }

    #[test]
    fn test_deserialize_rejects_empty_name() {
        assert!(NamedCategory::deserialize(
            r#"{"b_category": "  ", "c_category_description": "x"}"#
        )
        .is_err());
    }
}
