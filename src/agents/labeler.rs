//! Labeler: does the article fit an existing smart category?

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use crate::llm::{AgentConfig, ChatSession, Engine, LlmError, StructuredOutput};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

use super::prompts::LABELER_PROMPT;

/// A candidate category with its suitability rank; rank 1 is the best fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySuggestion {
    pub category: String,
    pub rank: u32,
}

#[derive(Debug)]
pub struct LabeledArticle {
    pub no_category: bool,
    pub suggestions: Vec<CategorySuggestion>,
}

impl LabeledArticle {
    /// The best-ranked suggestion among categories that actually exist.
    /// The model occasionally invents names; those are discarded here.
    pub fn best_existing(&self, existing: &BTreeMap<String, String>) -> Option<String> {
        if self.no_category {
            return None;
        }
        self.suggestions
            .iter()
            .filter(|s| existing.contains_key(&s.category))
            .min_by_key(|s| s.rank)
            .map(|s| s.category.clone())
    }
}

#[derive(Deserialize)]
struct WireSuggestion {
    a_category: String,
    b_rank: u32,
}

#[derive(Deserialize)]
struct Wire {
    b_no_category: bool,
    #[serde(default)]
    c_candidates: Vec<WireSuggestion>,
}

impl StructuredOutput for LabeledArticle {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "a_reasoning": { "type": "STRING" },
                "b_no_category": { "type": "BOOLEAN" },
                "c_candidates": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "a_category": { "type": "STRING" },
                            "b_rank": { "type": "INTEGER" }
                        },
                        "required": ["a_category", "b_rank"]
                    }
                }
            },
            "required": ["a_reasoning", "b_no_category"]
        })
    }

    fn deserialize(raw: &str) -> Result<Self, LlmError> {
        let wire: Wire = serde_json::from_str(raw)
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        Ok(Self {
            no_category: wire.b_no_category,
            suggestions: wire
                .c_candidates
                .into_iter()
                .map(|s| CategorySuggestion {
                    category: s.a_category,
                    rank: s.b_rank,
                })
                .collect(),
        })
    }
}

pub struct Labeler<'e> {
    session: ChatSession<'e>,
}

impl<'e> Labeler<'e> {
    pub fn new(
        engine: &'e dyn Engine,
        llm: &LlmSettings,
        session_id: &str,
        existing: &BTreeMap<String, String>,
    ) -> Self {
        let catalog = serde_json::to_string_pretty(existing).unwrap_or_default();
        let system_prompt = LABELER_PROMPT.replace("{existing_categories}", &catalog);
        let config = AgentConfig::for_agent("labeler", session_id, llm, &llm.basic_model, 0.2);
        Self {
            session: ChatSession::new(engine, config, system_prompt),
        }
    }

    pub fn label(
        &mut self,
        shutdown: &Shutdown,
        article: &str,
    ) -> Result<LabeledArticle, LlmError> {
        self.session.generate(shutdown, article)
    }
}
