//! LLM error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure talking to the engine.
    #[error("Engine request for model '{model}' failed: {source}")]
    Transport {
        model: String,
        #[source]
        source: reqwest::Error,
    },

    /// The engine answered with an error payload.
    #[error("Engine rejected request for model '{model}' (status {status}): {message}")]
    Engine {
        model: String,
        status: u16,
        message: String,
    },

    /// Generation stopped for a reason other than a natural stop.
    #[error("Unexpected finish reason: {0}")]
    UnexpectedFinishReason(String),

    /// The engine returned no candidate text at all.
    #[error("Engine returned an empty response")]
    EmptyResponse,

    /// The response text did not match the declared output schema.
    #[error("Failed to deserialize structured output: {0}")]
    Deserialization(String),

    /// Shutdown was requested while waiting for a rate-limit slot.
    #[error("Generation cancelled by shutdown")]
    Cancelled,
}
