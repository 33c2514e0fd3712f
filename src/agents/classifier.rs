//! Relation classifier: does the article concern Costa Rica at all?

use serde::Deserialize;
use serde_json::json;

use crate::db::notifier_repo::Relation;
use crate::llm::{AgentConfig, ChatSession, Engine, LlmError, StructuredOutput};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

use super::prompts::CLASSIFIER_PROMPT;

pub struct ClassifiedArticle {
    pub relation: Relation,
}

#[derive(Deserialize)]
struct Wire {
    b_relation: String,
}

impl StructuredOutput for ClassifiedArticle {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "a_reasoning": { "type": "STRING" },
                "b_relation": { "type": "STRING", "enum": ["direct", "indirect", "na"] }
            },
            "required": ["a_reasoning", "b_relation"]
        })
    }

    fn deserialize(raw: &str) -> Result<Self, LlmError> {
        let wire: Wire = serde_json::from_str(raw)
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        let relation = match wire.b_relation.as_str() {
            "direct" => Relation::Direct,
            "indirect" => Relation::Indirect,
            "na" => Relation::NotApplicable,
            other => {
                return Err(LlmError::Deserialization(format!(
                    "unknown relation '{other}'"
                )))
            }
        };
        Ok(Self { relation })
    }
}

pub struct Classifier<'e> {
    session: ChatSession<'e>,
}

impl<'e> Classifier<'e> {
    pub fn new(engine: &'e dyn Engine, llm: &LlmSettings, session_id: &str) -> Self {
        let config = AgentConfig::for_agent("classifier", session_id, llm, &llm.basic_model, 0.2);
        Self {
            session: ChatSession::new(engine, config, CLASSIFIER_PROMPT.to_string()),
        }
    }

    pub fn classify(&mut self, shutdown: &Shutdown, article: &str) -> Result<Relation, LlmError> {
        let classified: ClassifiedArticle = self.session.generate(shutdown, article)?;
        Ok(classified.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_relation() {
        let parsed =
            ClassifiedArticle::deserialize(r#"{"a_reasoning": "...", "b_relation": "indirect"}"#)
                .unwrap();
        assert_eq!(parsed.relation, Relation::Indirect);
    }

    #[test]
    fn test_deserialize_rejects_unknown_relation() {
        assert!(ClassifiedArticle::deserialize(r#"{"b_relation": "maybe"}"#).is_err());
        assert!(ClassifiedArticle::deserialize("not json").is_err());
    }
}
