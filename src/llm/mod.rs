pub mod anthropic;
pub mod client;
pub mod openai;

pub use client::LlmClient;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Anthropic,
    OpenAi,
    Deepseek,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [
        ProviderId::Anthropic,
        ProviderId::OpenAi,
        ProviderId::Deepseek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAi => "openai",
            ProviderId::Deepseek => "deepseek",
        }
    }

    pub fn server_address(self) -> &'static str {
        match self {
            ProviderId::Anthropic => "api.anthropic.com",
            ProviderId::OpenAi => "api.openai.com",
            ProviderId::Deepseek => "api.deepseek.com",
        }
    }

    pub fn download_file_name(self) -> String {
        format!("{}_prompt.md", self.as_str())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub mode: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
    pub provider: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, LlmError>;
    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub provider: ProviderId,
    #[serde(flatten)]
    pub outcome: CompletionOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CompletionOutcome {
    Ok { text: String, model: String },
    Error { message: String },
}

impl CompletionResult {
    pub fn new(provider: ProviderId, result: Result<GenerateResponse, LlmError>) -> Self {
        let outcome = match result {
            Ok(resp) => CompletionOutcome::Ok {
                text: resp.content,
                model: resp.model,
            },
            Err(err) => CompletionOutcome::Error {
                message: err.to_string(),
            },
        };
        Self { provider, outcome }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, CompletionOutcome::Ok { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_round_trips_through_serde() {
        for id in ProviderId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
            let back: ProviderId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }

    #[test]
    fn test_provider_id_rejects_unknown_name() {
        let result = serde_json::from_str::<ProviderId>("\"mistral\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_download_file_names_are_deterministic() {
        assert_eq!(
            ProviderId::Anthropic.download_file_name(),
            "anthropic_prompt.md"
        );
        assert_eq!(ProviderId::OpenAi.download_file_name(), "openai_prompt.md");
        assert_eq!(
            ProviderId::Deepseek.download_file_name(),
            "deepseek_prompt.md"
        );
    }

    #[test]
    fn test_llm_error_provider_display() {
        let err = LlmError::Provider {
            status: 401,
            message: "invalid x-api-key".to_string(),
        };
        assert_eq!(err.to_string(), "provider error (401): invalid x-api-key");
    }

    #[test]
    fn test_llm_error_transport_display() {
        let err = LlmError::Transport("connection reset by peer".to_string());
        assert_eq!(err.to_string(), "transport error: connection reset by peer");
    }

    #[test]
    fn test_completion_result_ok_serializes_flat() {
        let result = CompletionResult::new(
            ProviderId::OpenAi,
            Ok(GenerateResponse {
                content: "generated text".to_string(),
                model: "gpt-4o".to_string(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: "stop".to_string(),
                provider: "openai".to_string(),
            }),
        );
        assert!(result.is_ok());

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["provider"], "openai");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["text"], "generated text");
        assert_eq!(value["model"], "gpt-4o");
    }

    #[test]
    fn test_completion_result_error_serializes_flat() {
        let result = CompletionResult::new(
            ProviderId::Anthropic,
            Err(LlmError::Provider {
                status: 429,
                message: "rate limited".to_string(),
            }),
        );
        assert!(!result.is_ok());

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["provider"], "anthropic");
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "provider error (429): rate limited");
        assert!(value.get("text").is_none());
    }
}
