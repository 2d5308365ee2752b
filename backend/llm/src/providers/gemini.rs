use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{future, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use homh_core::{FragmentStream, GenerationOptions, HomhError, LlmProvider, LlmRequest};
use homh_logging::redact_sensitive_data;

use crate::sse::sse_data_stream;

const PROVIDER_NAME: &str = "gemini";

/// Finish reasons that mean the candidate was withheld rather than completed.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Google Gemini streaming provider.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            default_model: "gemini-1.5-flash-latest".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn stream_url(&self, model: &str) -> String {
        format!("{}/models/{}:streamGenerateContent", self.base_url, model)
    }
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl<'a> GenerateRequest<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart {
                    text: &request.instruction,
                }],
            }],
            generation_config: generation_config(&request.options),
        }
    }
}

fn generation_config(options: &GenerationOptions) -> Option<GenerationConfig> {
    if options.is_empty() {
        return None;
    }
    Some(GenerationConfig {
        temperature: options.temperature,
        max_output_tokens: options.max_output_tokens,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Extract the text carried by one streamed chunk.
///
/// `Ok(None)` means the chunk carried no text (metadata only). Blocked
/// prompts, withheld candidates, and in-stream API errors are failures.
fn parse_chunk(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| HomhError::provider(PROVIDER_NAME, format!("malformed stream chunk: {e}")))?;

    if let Some(err) = chunk.error {
        let code = err.code.map(|c| c.to_string()).unwrap_or_else(|| "?".into());
        return Err(HomhError::provider(
            PROVIDER_NAME,
            format!("stream error {code}: {}", redact_sensitive_data(&err.message)),
        )
        .into());
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(HomhError::provider(PROVIDER_NAME, format!("prompt blocked: {reason}")).into());
        }
        return Ok(None);
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate
            .finish_reason
            .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()))
        {
            return Err(
                HomhError::provider(PROVIDER_NAME, format!("response withheld: {reason}")).into(),
            );
        }
        return Ok(None);
    }

    Ok(Some(text))
}

/// Map a non-success HTTP response to a provider error.
fn map_api_error(status: reqwest::StatusCode, body: &str) -> HomhError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    HomhError::provider(
        PROVIDER_NAME,
        format!("HTTP {status}: {}", redact_sensitive_data(&message)),
    )
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = GenerateRequest::from_request(request);

        debug!(
            model = %model,
            instruction_len = request.instruction.len(),
            "Opening Gemini stream"
        );

        let response = self
            .client
            .post(self.stream_url(model))
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &error_body).into());
        }

        let fragments = sse_data_stream(response.bytes_stream()).filter_map(|event| {
            future::ready(match event {
                Ok(data) => parse_chunk(&data).transpose(),
                Err(e) => Some(Err(e)),
            })
        });

        Ok(fragments.boxed())
    }
}
