//! LLM engine abstraction and per-agent chat sessions.
//!
//! An [`Engine`] turns a generation request (system prompt, chat history,
//! optional structured-output schema) into text. A [`ChatSession`] owns one
//! agent's linear history on top of an engine: prompts and responses are
//! appended in pairs, and on any generation or deserialization error the
//! last user prompt is removed again so retries do not compound.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::ratelimit::RateLimiter;
use crate::runtime::Shutdown;
use crate::settings::{LlmSettings, ModelSettings};
use crate::storage;

mod error;
pub mod gemini;

pub use error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other(String),
}

impl FinishReason {
    fn describe(&self) -> String {
        match self {
            FinishReason::Stop => "STOP".to_string(),
            FinishReason::MaxTokens => "MAX_TOKENS".to_string(),
            FinishReason::Safety => "SAFETY".to_string(),
            FinishReason::Recitation => "RECITATION".to_string(),
            FinishReason::Other(reason) => reason.clone(),
        }
    }
}

/// One generation call to an engine.
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub history: &'a [ChatTurn],
    pub temperature: f32,
    pub max_tokens: u32,
    /// When set, the engine must answer with JSON matching this schema.
    pub response_schema: Option<serde_json::Value>,
}

pub struct GenerationOutcome {
    pub text: String,
    pub finish_reason: FinishReason,
}

pub trait Engine: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome, LlmError>;
}

/// A structured-output variant an agent can request: the declared schema
/// plus the deserializer for the engine's JSON answer.
pub trait StructuredOutput: Sized {
    fn schema() -> serde_json::Value;
    fn deserialize(raw: &str) -> Result<Self, LlmError>;
}

/// Per-agent configuration resolved from settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: &'static str,
    pub session_id: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_limit: u32,
    pub request_limit_period_seconds: u64,
    /// Model that reparses free text into the schema when the primary
    /// model lacks native structured output.
    pub supplementary_model: Option<String>,
    pub keep_raw_responses: bool,
    pub raw_responses_dir: PathBuf,
}

impl AgentConfig {
    pub fn for_agent(
        agent_id: &'static str,
        session_id: &str,
        llm: &LlmSettings,
        model: &ModelSettings,
        temperature: f32,
    ) -> Self {
        Self {
            agent_id,
            session_id: session_id.to_string(),
            model: model.model.clone(),
            temperature,
            max_tokens: 8192,
            request_limit: model.request_limit,
            request_limit_period_seconds: model.request_limit_period_seconds,
            supplementary_model: model
                .requires_supplementary
                .then(|| llm.supplementary_model.clone()),
            keep_raw_responses: llm.keep_raw_engine_responses,
            raw_responses_dir: llm.raw_engine_responses_dir.clone(),
        }
    }
}

const REPARSE_SYSTEM_PROMPT: &str = "You convert a model's free-text answer into JSON that \
matches the requested schema exactly. Output only the JSON object, no commentary.";

pub struct ChatSession<'e> {
    engine: &'e dyn Engine,
    config: AgentConfig,
    system_prompt: String,
    history: Vec<ChatTurn>,
    limiter: Arc<RateLimiter>,
    supplementary_limiter: Option<Arc<RateLimiter>>,
}

impl<'e> ChatSession<'e> {
    pub fn new(engine: &'e dyn Engine, config: AgentConfig, system_prompt: String) -> Self {
        let limiter = RateLimiter::for_model(
            &config.model,
            config.request_limit,
            config.request_limit_period_seconds,
        );
        let supplementary_limiter = config.supplementary_model.as_deref().map(|model| {
            RateLimiter::for_model(
                model,
                config.request_limit,
                config.request_limit_period_seconds,
            )
        });
        Self {
            engine,
            config,
            system_prompt,
            history: Vec::new(),
            limiter,
            supplementary_limiter,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Sends `prompt` in this session and deserializes the answer into `T`.
    ///
    /// On success the prompt/response pair becomes part of the history. On
    /// any failure the prompt is removed again.
    pub fn generate<T: StructuredOutput>(
        &mut self,
        shutdown: &Shutdown,
        prompt: &str,
    ) -> Result<T, LlmError> {
        if !self.limiter.acquire(shutdown) {
            return Err(LlmError::Cancelled);
        }

        self.history.push(ChatTurn {
            role: Role::User,
            text: prompt.to_string(),
        });

        match self.generate_current::<T>(shutdown) {
            Ok((raw, value)) => {
                self.history.push(ChatTurn {
                    role: Role::Model,
                    text: raw,
                });
                Ok(value)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    fn generate_current<T: StructuredOutput>(
        &self,
        shutdown: &Shutdown,
    ) -> Result<(String, T), LlmError> {
        let schema = T::schema();
        let native_schema = self.config.supplementary_model.is_none();

        let outcome = self.engine.generate(&GenerationRequest {
            model: &self.config.model,
            system_prompt: &self.system_prompt,
            history: &self.history,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_schema: native_schema.then(|| schema.clone()),
        })?;
        self.dump_raw(&outcome.text);

        if outcome.finish_reason != FinishReason::Stop {
            return Err(LlmError::UnexpectedFinishReason(
                outcome.finish_reason.describe(),
            ));
        }

        let structured_text = match self.config.supplementary_model.as_deref() {
            None => outcome.text.clone(),
            Some(model) => {
                self.reparse_with_supplementary(shutdown, model, &outcome.text, schema)?
            }
        };

        let value = T::deserialize(&structured_text)?;
        Ok((outcome.text, value))
    }

    /// Reparses a free-text answer into the declared schema using the
    /// supplementary model at temperature 0.
    fn reparse_with_supplementary(
        &self,
        shutdown: &Shutdown,
        model: &str,
        free_text: &str,
        schema: serde_json::Value,
    ) -> Result<String, LlmError> {
        if let Some(limiter) = &self.supplementary_limiter {
            if !limiter.acquire(shutdown) {
                return Err(LlmError::Cancelled);
            }
        }

        debug!(agent = self.config.agent_id, model, "Reparsing free-text response");
        let turns = [ChatTurn {
            role: Role::User,
            text: free_text.to_string(),
        }];
        let outcome = self.engine.generate(&GenerationRequest {
            model,
            system_prompt: REPARSE_SYSTEM_PROMPT,
            history: &turns,
            temperature: 0.0,
            max_tokens: self.config.max_tokens,
            response_schema: Some(schema),
        })?;

        if outcome.finish_reason != FinishReason::Stop {
            return Err(LlmError::UnexpectedFinishReason(
                outcome.finish_reason.describe(),
            ));
        }
        Ok(outcome.text)
    }

    fn dump_raw(&self, text: &str) {
        if !self.config.keep_raw_responses {
            return;
        }
        let path = storage::raw_response_path(
            &self.config.raw_responses_dir,
            &self.config.session_id,
            self.config.agent_id,
            &Utc::now(),
        );
        if let Err(e) = storage::write_atomic(&path, text.as_bytes()) {
            warn!(agent = self.config.agent_id, error = %e, "Failed to dump raw response");
        }
    }
}

/// Builds the configured engine. Fatal at startup for unknown engines.
pub fn build_engine(llm: &LlmSettings) -> Result<Box<dyn Engine>, crate::error::ConfigError> {
    match llm.engine.as_str() {
        "gemini" => gemini::GeminiEngine::new(&llm.api_key)
            .map(|engine| Box::new(engine) as Box<dyn Engine>)
            .map_err(|e| crate::error::ConfigError::InvalidVar {
                key: "AGENT_ENGINE_API_KEY".to_string(),
                reason: e.to_string(),
            }),
        other => Err(crate::error::ConfigError::InvalidVar {
            key: "AGENT_ENGINE".to_string(),
            reason: format!("unknown engine '{other}'"),
        }),
    }
}
