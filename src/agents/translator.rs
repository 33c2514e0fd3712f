//! Summary translator for each additional configured language.

use serde::Deserialize;
use serde_json::json;

use crate::llm::{AgentConfig, ChatSession, Engine, LlmError, StructuredOutput};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

use super::prompts::TRANSLATOR_PROMPT;

pub struct TranslatedSummary {
    pub translation: String,
}

#[derive(Deserialize)]
struct Wire {
    a_translation: String,
}

impl StructuredOutput for TranslatedSummary {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "a_translation": { "type": "STRING" }
            },
            "required": ["a_translation"]
        })
    }

    fn deserialize(raw: &str) -> Result<Self, LlmError> {
        let wire: Wire = serde_json::from_str(raw)
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        let translation = wire.a_translation.trim().to_string();
        if translation.is_empty() {
            return Err(LlmError::Deserialization("empty translation".to_string()));
        }
        Ok(Self { translation })
    }
}

/// Human-readable language name for a configured code; the prompt reads
/// better with "Russian" than with "ru". Unknown codes pass through as-is.
pub fn language_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "en" => "English",
        "es" => "Spanish",
        "de" => "German",
        "fr" => "French",
        "pt" => "Portuguese",
        other => other,
    }
}

pub struct Translator<'e> {
    session: ChatSession<'e>,
}

impl<'e> Translator<'e> {
    pub fn new(engine: &'e dyn Engine, llm: &LlmSettings, session_id: &str, lang: &str) -> Self {
        let system_prompt = TRANSLATOR_PROMPT.replace("{language}", language_name(lang));
        let config = AgentConfig::for_agent("translator", session_id, llm, &llm.light_model, 0.2);
        Self {
            session: ChatSession::new(engine, config, system_prompt),
        }
    }

    pub fn translate(&mut self, shutdown: &Shutdown, summary: &str) -> Result<String, LlmError> {
        let translated: TranslatedSummary = self.session.generate(shutdown, summary)?;
        Ok(translated.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name_mapping() {
        assert_eq!(language_name("ru"), "Russian");
        assert_eq!(language_name("uk"), "uk");
    }

    #[test]
    fn test_deserialize_translation() {
        let parsed =
            TranslatedSummary::deserialize(r#"{"a_translation": "Сводка новостей"}"#).unwrap();
        assert_eq!(parsed.translation, "Сводка новостей");
    }
}
