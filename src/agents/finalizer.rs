//! Label finalizer: picks between the best existing category and the
//! namer's fresh proposal.
//!
//! The two candidates are presented under opaque labels in randomized
//! order, with an internal mapping back to the real names. The model must
//! judge by descriptions and article content alone, never by which option
//! came first or how its name reads.

use std::collections::HashMap;

use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{AgentConfig, ChatSession, Engine, LlmError, StructuredOutput};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

use super::prompts::FINALIZER_PROMPT;

const OPTION_A: &str = "OPTION_A";
const OPTION_B: &str = "OPTION_B";

/// The finalizer's verdict, already mapped back to the real category.
#[derive(Debug, Clone)]
pub struct FinalizedLabel {
    pub category: String,
    pub new_chosen: bool,
}

struct ChosenOption {
    label: String,
}

#[derive(Deserialize)]
struct Wire {
    b_chosen: String,
}

impl StructuredOutput for ChosenOption {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "a_reasoning": { "type": "STRING" },
                "b_chosen": { "type": "STRING", "enum": [OPTION_A, OPTION_B] }
            },
            "required": ["a_reasoning", "b_chosen"]
        })
    }

    fn deserialize(raw: &str) -> Result<Self, LlmError> {
        let wire: Wire = serde_json::from_str(raw)
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        Ok(Self { label: wire.b_chosen })
    }
}

pub struct LabelFinalizer<'e> {
    session: ChatSession<'e>,
    /// Opaque label -> (real category name, is the new proposal).
    label_map: HashMap<&'static str, (String, bool)>,
}

impl<'e> LabelFinalizer<'e> {
    /// `existing` and `proposal` are `(name, description)` pairs.
    pub fn new(
        engine: &'e dyn Engine,
        llm: &LlmSettings,
        session_id: &str,
        existing: (String, String),
        proposal: (String, String),
    ) -> Self {
        let mut rng = rand::thread_rng();
        let existing_first: bool = rng.gen();

        let mut label_map = HashMap::new();
        let (first, second) = if existing_first {
            (existing, proposal)
        } else {
            (proposal, existing)
        };
        label_map.insert(OPTION_A, (first.0, !existing_first));
        label_map.insert(OPTION_B, (second.0, existing_first));

        let options = format!(
            "- {OPTION_A}: {}\n- {OPTION_B}: {}",
            first.1, second.1
        );
        let system_prompt = FINALIZER_PROMPT.replace("{options}", &options);
        let config =
            AgentConfig::for_agent("label_finalizer", session_id, llm, &llm.basic_model, 0.2);
        Self {
            session: ChatSession::new(engine, config, system_prompt),
            label_map,
        }
    }

    pub fn finalize(
        &mut self,
        shutdown: &Shutdown,
        article: &str,
    ) -> Result<FinalizedLabel, LlmError> {
        let chosen: ChosenOption = self.session.generate(shutdown, article)?;
        let (category, new_chosen) =
            self.label_map
                .get(chosen.label.as_str())
                .cloned()
                .ok_or_else(|| {
                    LlmError::Deserialization(format!("unknown option '{}'", chosen.label))
                })?;
        Ok(FinalizedLabel { category, new_chosen })
    }
}
