use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{CompletionResult, GenerateRequest, GenerateResponse, LlmError, Provider, ProviderId};
use crate::telemetry::metrics::{
    COMPARE_SLOT_FAILURES, GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_TOKEN_USAGE,
};

pub struct LlmClient {
    anthropic: Arc<dyn Provider>,
    openai: Arc<dyn Provider>,
    deepseek: Arc<dyn Provider>,
}

impl LlmClient {
    pub fn new(
        anthropic: Arc<dyn Provider>,
        openai: Arc<dyn Provider>,
        deepseek: Arc<dyn Provider>,
    ) -> Self {
        Self {
            anthropic,
            openai,
            deepseek,
        }
    }

    fn provider(&self, id: ProviderId) -> &dyn Provider {
        match id {
            ProviderId::Anthropic => self.anthropic.as_ref(),
            ProviderId::OpenAi => self.openai.as_ref(),
            ProviderId::Deepseek => self.deepseek.as_ref(),
        }
    }

    pub async fn generate(
        &self,
        id: ProviderId,
        req: &GenerateRequest,
    ) -> Result<GenerateResponse, LlmError> {
        let provider = self.provider(id);
        let model = provider.model().to_string();
        let span_display_name = format!("gen_ai.chat {model}");
        let start = Instant::now();

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %span_display_name,
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %id,
            gen_ai.request.model = %model,
            server.address = %id.server_address(),
            server.port = 443_i64,
            gen_ai.request.max_tokens = req.max_tokens as i64,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            prompt.mode = %req.mode,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        span.add_event(
            "gen_ai.user.message",
            vec![KeyValue::new("gen_ai.prompt", truncate(&req.prompt, 1000))],
        );

        let result = provider.generate(req).instrument(span.clone()).await;

        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(mut resp) => {
                resp.provider = id.as_str().to_string();

                span.record("gen_ai.response.model", resp.model.as_str());
                span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);
                if !resp.finish_reason.is_empty() {
                    span.record(
                        "gen_ai.response.finish_reasons",
                        resp.finish_reason.as_str(),
                    );
                }

                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new(
                        "gen_ai.completion",
                        truncate(&resp.content, 2000),
                    )],
                );

                let op_kv = KeyValue::new("gen_ai.operation.name", "chat");
                let provider_kv = KeyValue::new("gen_ai.provider.name", id.to_string());
                let model_kv = KeyValue::new("gen_ai.request.model", resp.model.clone());

                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.input_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "input"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.output_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "output"),
                        op_kv.clone(),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_OPERATION_DURATION.record(duration, &[op_kv, provider_kv, model_kv]);

                Ok(resp)
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", classify_error(&err));

                GEN_AI_ERROR_COUNT.add(
                    1,
                    &[
                        KeyValue::new("gen_ai.provider.name", id.to_string()),
                        KeyValue::new("gen_ai.request.model", model),
                    ],
                );

                Err(err)
            }
        }
    }

    // One call per provider, no ordering dependency. A failed slot never
    // aborts the sibling calls.
    pub async fn compare(&self, req: &GenerateRequest) -> Vec<CompletionResult> {
        let (anthropic, openai, deepseek) = tokio::join!(
            self.generate(ProviderId::Anthropic, req),
            self.generate(ProviderId::OpenAi, req),
            self.generate(ProviderId::Deepseek, req),
        );

        let results = vec![
            CompletionResult::new(ProviderId::Anthropic, anthropic),
            CompletionResult::new(ProviderId::OpenAi, openai),
            CompletionResult::new(ProviderId::Deepseek, deepseek),
        ];

        for slot in results.iter().filter(|s| !s.is_ok()) {
            tracing::warn!(provider = %slot.provider, "comparison slot failed");
            COMPARE_SLOT_FAILURES.add(
                1,
                &[KeyValue::new(
                    "gen_ai.provider.name",
                    slot.provider.to_string(),
                )],
            );
        }

        results
    }
}

fn classify_error(err: &LlmError) -> &'static str {
    match err {
        LlmError::Provider { status, .. } => match *status {
            401 | 403 => "auth_error",
            429 => "rate_limit",
            400 | 422 => "invalid_request",
            s if s >= 500 => "server_error",
            _ => "provider_error",
        },
        LlmError::Transport(msg) => {
            let msg = msg.to_lowercase();
            if msg.contains("timed out") || msg.contains("timeout") {
                "timeout"
            } else {
                "network_error"
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, _)| i < max)
            .map(|(_, c)| c)
            .collect()
    }
}
