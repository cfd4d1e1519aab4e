//! Google Gemini REST backend.
//!
//! One `generateContent` call per attempt. Failures are classified from the
//! HTTP status and the structured `error.status` / `ErrorInfo.reason`
//! fields Google returns, never from the human-readable message.

use super::{Generation, ModelBackend};
use crate::config::{mask_secret, ExtractionConfig};
use crate::error::{BackendError, ExtractError, FailureKind};
use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini `generateContent` client.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &mask_secret(&self.api_key))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }

    async fn call(&self, model: &str, prompt: &str) -> Result<Generation, BackendError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        debug!(
            "POST {} (key {}, {} prompt chars)",
            self.endpoint(model),
            mask_secret(&self.api_key),
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(error_from_response(status, &bytes));
        }

        parse_response(&bytes)
    }
}

impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn credential_hint(&self) -> Option<String> {
        Some(mask_secret(&self.api_key))
    }

    fn generate<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<Generation, BackendError>> {
        Box::pin(self.call(model, prompt))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

// ── Classification ───────────────────────────────────────────────────────

/// Map an HTTP status plus Google's canonical status / error reason to a kind.
pub fn classify(status: StatusCode, api_status: Option<&str>, reason: Option<&str>) -> FailureKind {
    if matches!(reason, Some("API_KEY_INVALID") | Some("API_KEY_SERVICE_BLOCKED")) {
        return FailureKind::Permission;
    }
    match api_status {
        Some("RESOURCE_EXHAUSTED") => return FailureKind::RateLimited,
        Some("UNAVAILABLE") | Some("DEADLINE_EXCEEDED") | Some("INTERNAL") => {
            return FailureKind::Unavailable
        }
        Some("NOT_FOUND") => return FailureKind::ModelNotFound,
        Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => return FailureKind::Permission,
        _ => {}
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited,
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => FailureKind::Unavailable,
        StatusCode::NOT_FOUND => FailureKind::ModelNotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Permission,
        StatusCode::PAYLOAD_TOO_LARGE => FailureKind::PayloadTooLarge,
        _ => FailureKind::Other,
    }
}

fn error_from_response(status: StatusCode, body: &[u8]) -> BackendError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .details
                .iter()
                .find_map(|d| d.get("reason").and_then(|r| r.as_str()));
            let kind = classify(status, envelope.error.status.as_deref(), reason);
            BackendError::new(kind, format!("HTTP {}: {}", status.as_u16(), envelope.error.message))
        }
        Err(_) => {
            let snippet: String = String::from_utf8_lossy(body).chars().take(200).collect();
            BackendError::new(
                classify(status, None, None),
                format!("HTTP {}: {}", status.as_u16(), snippet.trim()),
            )
        }
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    let kind = if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        FailureKind::Unavailable
    } else {
        FailureKind::Other
    };
    BackendError::new(kind, e.to_string())
}

fn parse_response(body: &[u8]) -> Result<Generation, BackendError> {
    let response: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| BackendError::new(FailureKind::Other, format!("Malformed response: {e}")))?;

    if response.candidates.is_empty() {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::new(
                FailureKind::Other,
                format!("Prompt blocked by the model: {reason}"),
            ));
        }
    }

    let candidate = response.candidates.first();
    match candidate.and_then(|c| c.finish_reason.as_deref()) {
        Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII")) => {
            return Err(BackendError::new(
                FailureKind::Other,
                format!("Response stopped by the model: {reason}"),
            ));
        }
        Some("MAX_TOKENS") => {
            warn!("Response hit the output token limit; the HTML is truncated");
        }
        _ => {}
    }

    let text = candidate
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    let usage = response.usage_metadata.unwrap_or_default();
    Ok(Generation {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}
