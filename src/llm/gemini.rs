//! Gemini REST engine.
//!
//! Talks to the `generateContent` endpoint with an optional response schema
//! for native structured output.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ChatTurn, Engine, FinishReason, GenerationOutcome, GenerationRequest, LlmError, Role};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

pub struct GeminiEngine {
    http: Client,
    api_base: String,
    api_key: String,
}

impl GeminiEngine {
    pub fn new(api_key: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_base: GEMINI_API_BASE.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    fn finish_reason(raw: Option<String>) -> FinishReason {
        match raw.as_deref() {
            Some("STOP") | None => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::MaxTokens,
            Some("SAFETY") => FinishReason::Safety,
            Some("RECITATION") => FinishReason::Recitation,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }
}

impl Engine for GeminiEngine {
    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome, LlmError> {
        let body = GenerateContentBody {
            system_instruction: (!request.system_prompt.is_empty()).then(|| Content {
                role: String::new(),
                parts: vec![Part {
                    text: request.system_prompt.to_string(),
                }],
            }),
            contents: request
                .history
                .iter()
                .map(|turn: &ChatTurn| Content {
                    role: Self::role_name(turn.role).to_string(),
                    parts: vec![Part {
                        text: turn.text.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.response_schema.is_some().then_some("application/json"),
                response_schema: request.response_schema.clone(),
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, request.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| LlmError::Transport {
                model: request.model.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(LlmError::Engine {
                model: request.model.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse =
            response.json().map_err(|e| LlmError::Transport {
                model: request.model.to_string(),
                source: e,
            })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(GenerationOutcome {
            text,
            finish_reason: Self::finish_reason(candidate.finish_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(GeminiEngine::finish_reason(Some("STOP".into())), FinishReason::Stop);
        assert_eq!(GeminiEngine::finish_reason(None), FinishReason::Stop);
        assert_eq!(
            GeminiEngine::finish_reason(Some("MAX_TOKENS".into())),
            FinishReason::MaxTokens
        );
        assert_eq!(
            GeminiEngine::finish_reason(Some("PROHIBITED_CONTENT".into())),
            FinishReason::Other("PROHIBITED_CONTENT".to_string())
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentBody {
            system_instruction: Some(Content {
                role: String::new(),
                parts: vec![Part { text: "sys".into() }],
            }),
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part { text: "hola".into() }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 8192,
                response_mime_type: Some("application/json"),
                response_schema: Some(serde_json::json!({ "type": "OBJECT" })),
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["contents"][0]["role"], "user");
        assert!(json["systemInstruction"]["parts"][0]["text"].is_string());
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "{\"a\":1}" }] },
                "finishReason": "STOP"
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let candidate = &parsed.candidates[0];
        assert_eq!(candidate.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(candidate.content.as_ref().unwrap().parts[0].text, "{\"a\":1}");
    }
}
