use serde::{Deserialize, Serialize};

use super::{GenerateRequest, GenerateResponse, LlmError, Provider};

// Serves every OpenAI-compatible chat-completions API; DeepSeek differs only
// in base URL, credential, and model.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    provider_name: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self::with_name(base_url, api_key, model, "openai")
    }

    pub fn new_deepseek(base_url: &str, api_key: &str, model: &str) -> Self {
        Self::with_name(base_url, api_key, model, "deepseek")
    }

    fn with_name(base_url: &str, api_key: &str, model: &str, provider_name: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            provider_name: provider_name.to_string(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ChatError {
    error: ChatErrorDetail,
}

#[derive(Deserialize)]
struct ChatErrorDetail {
    message: String,
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: req.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: req.prompt.clone(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ChatError>(&body_text) {
                Ok(err) => err.error.message,
                Err(_) => body_text,
            };
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let resp: ChatResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::Provider {
                status: status.as_u16(),
                message: format!("unexpected response shape: {e}"),
            })?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Provider {
                status: status.as_u16(),
                message: "response contained no choices".to_string(),
            })?;

        let content = choice.message.content.ok_or_else(|| LlmError::Provider {
            status: status.as_u16(),
            message: "response contained no message content".to_string(),
        })?;

        let (input_tokens, output_tokens) = match resp.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (0, 0),
        };

        Ok(GenerateResponse {
            content,
            model: resp.model,
            input_tokens,
            output_tokens,
            finish_reason: choice.finish_reason.unwrap_or_default(),
            provider: String::new(),
        })
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
