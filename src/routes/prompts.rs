use std::time::Instant;

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppResult;
use crate::llm::{GenerateRequest, ProviderId};
use crate::prompt::PromptRequest;
use crate::telemetry::metrics::{PROMPT_GENERATION_DURATION, PROMPT_RENDERED_LENGTH};

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub project_idea: String,
    pub requirements: Option<String>,
    pub provider: ProviderId,
}

#[derive(Debug, Deserialize)]
pub struct CompareBody {
    pub project_idea: String,
    pub requirements: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub provider: ProviderId,
    pub text: String,
}

pub async fn generate_prompt(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> AppResult<Json<Value>> {
    let start = Instant::now();

    let request = PromptRequest::new(&body.project_idea, body.requirements.as_deref())?;
    let prompt = request.render();
    PROMPT_RENDERED_LENGTH.record(prompt.chars().count() as f64, &[]);

    let resp = state
        .llm_client
        .generate(
            body.provider,
            &GenerateRequest {
                prompt,
                max_tokens: state.config.default_max_tokens,
                mode: "single".to_string(),
            },
        )
        .await?;

    PROMPT_GENERATION_DURATION.record(start.elapsed().as_secs_f64(), &[]);

    Ok(Json(json!({
        "provider": resp.provider,
        "model": resp.model,
        "text": resp.content,
        "input_tokens": resp.input_tokens,
        "output_tokens": resp.output_tokens,
    })))
}

// Same validation as single mode: a blank project idea never reaches the
// network from either path.
pub async fn compare_prompts(
    State(state): State<AppState>,
    Json(body): Json<CompareBody>,
) -> AppResult<Json<Value>> {
    let start = Instant::now();

    let request = PromptRequest::new(&body.project_idea, body.requirements.as_deref())?;
    let prompt = request.render();
    PROMPT_RENDERED_LENGTH.record(prompt.chars().count() as f64, &[]);

    let results = state
        .llm_client
        .compare(&GenerateRequest {
            prompt,
            max_tokens: state.config.default_max_tokens,
            mode: "compare".to_string(),
        })
        .await;

    PROMPT_GENERATION_DURATION.record(start.elapsed().as_secs_f64(), &[]);

    Ok(Json(json!({ "results": results })))
}

pub async fn download_prompt(Json(body): Json<DownloadBody>) -> Response {
    let file_name = body.provider.download_file_name();
    let headers = [
        (
            header::CONTENT_TYPE,
            "text/markdown; charset=utf-8".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ),
    ];

    (headers, body.text).into_response()
}
