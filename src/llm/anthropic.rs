use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{GenerateRequest, GenerateResponse, LlmError, Provider};

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    usage: AnthropicUsage,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

#[async_trait::async_trait]
impl Provider for AnthropicProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LlmError::Transport(format!("invalid API key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: req.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: req.prompt.clone(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<AnthropicError>(&body_text) {
                Ok(err) => err.error.message,
                Err(_) => body_text,
            };
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let resp: AnthropicResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::Provider {
                status: status.as_u16(),
                message: format!("unexpected response shape: {e}"),
            })?;

        let content = resp
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerateResponse {
            content,
            model: resp.model,
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
            finish_reason: resp.stop_reason.unwrap_or_default(),
            provider: String::new(),
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_proxy_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::new(&server.uri(), "test-key", "claude-3-5-sonnet-20241022")
            .with_client(no_proxy_client())
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            prompt: "Build a REST API with Flask".to_string(),
            max_tokens: 1500,
            mode: "single".to_string(),
        }
    }

    fn valid_response() -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": "X"}],
            "model": "claude-3-5-sonnet-20241022",
            "usage": {"input_tokens": 12, "output_tokens": 3},
            "stop_reason": "end_turn"
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_sends_auth_headers_and_extracts_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-3-5-sonnet-20241022",
                "max_tokens": 1500,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(valid_response()))
            .expect(1)
            .mount(&server)
            .await;

        let resp = provider_for(&server).generate(&request()).await.unwrap();
        assert_eq!(resp.content, "X");
        assert_eq!(resp.model, "claude-3-5-sonnet-20241022");
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 3);
        assert_eq!(resp.finish_reason, "end_turn");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_joins_multiple_text_blocks() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "Hello "},
                    {"type": "tool_use", "text": null},
                    {"type": "text", "text": "world"}
                ],
                "model": "claude-3-5-sonnet-20241022",
                "usage": {"input_tokens": 5, "output_tokens": 2},
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let resp = provider_for(&server).generate(&request()).await.unwrap();
        assert_eq!(resp.content, "Hello world");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_maps_401_to_provider_error_with_body_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate(&request()).await.unwrap_err();
        match err {
            LlmError::Provider { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_keeps_raw_body_when_error_shape_unknown() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate(&request()).await.unwrap_err();
        match err {
            LlmError::Provider { status, message } => {
                assert_eq!(status, 529);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_maps_unparseable_success_body_to_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate(&request()).await.unwrap_err();
        match err {
            LlmError::Provider { status, message } => {
                assert_eq!(status, 200);
                assert!(message.contains("unexpected response shape"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_maps_connection_failure_to_transport_error() {
        let provider = AnthropicProvider::new("http://127.0.0.1:1", "key", "model")
            .with_client(no_proxy_client());

        let err = provider.generate(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }
}
