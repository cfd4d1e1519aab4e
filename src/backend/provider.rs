//! Generic chat-provider backend built on `edgequake-llm`.
//!
//! Lets the extractor run against OpenAI, Anthropic, Ollama or any other
//! provider the factory knows, with the same fallback list semantics: one
//! provider instance is created per candidate model. Provider API keys are
//! read from the environment by the factory (`OPENAI_API_KEY`, …).
//!
//! `edgequake-llm` surfaces failures as display strings, so this is the one
//! place where a [`FailureKind`] is derived from text. The result is attached
//! to the [`BackendError`] here and never re-derived further up.

use super::{Generation, ModelBackend};
use crate::config::ExtractionConfig;
use crate::error::{BackendError, FailureKind};
use edgequake_llm::{ChatMessage, CompletionOptions, ProviderFactory};
use futures::future::BoxFuture;
use tracing::debug;

/// Backend that delegates to an `edgequake-llm` provider.
#[derive(Debug, Clone)]
pub struct ProviderBackend {
    provider_name: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl ProviderBackend {
    pub fn new(provider_name: impl Into<String>, config: &ExtractionConfig) -> Self {
        Self {
            provider_name: provider_name.into(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    async fn call(&self, model: &str, prompt: &str) -> Result<Generation, BackendError> {
        let provider = ProviderFactory::create_llm_provider(&self.provider_name, model)
            .map_err(|e| {
                let msg = format!("{e}");
                BackendError::new(classify_message(&msg), msg)
            })?;

        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_output_tokens as usize),
            ..Default::default()
        };

        debug!("{} / {}: sending {} chars", self.provider_name, model, prompt.len());

        let response = provider.chat(&messages, Some(&options)).await.map_err(|e| {
            let msg = format!("{e}");
            BackendError::new(classify_message(&msg), msg)
        })?;

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

impl ModelBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn generate<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<Generation, BackendError>> {
        Box::pin(self.call(model, prompt))
    }
}

/// Classify a provider error message.
///
/// Checked in priority order: quota first (a 429 body often also says
/// "unavailable"), then credential, size, missing model, transient.
pub fn classify_message(message: &str) -> FailureKind {
    let m = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

    if has(&["429", "rate limit", "rate_limit", "ratelimit", "quota", "resource_exhausted"]) {
        FailureKind::RateLimited
    } else if has(&[
        "401",
        "403",
        "unauthorized",
        "unauthenticated",
        "permission",
        "invalid api key",
        "api key not valid",
        "incorrect api key",
        "authentication",
    ]) {
        FailureKind::Permission
    } else if has(&["413", "too large", "context length", "context_length", "maximum context"]) {
        FailureKind::PayloadTooLarge
    } else if has(&["404", "not found", "not_found", "does not exist", "not supported", "unknown model"]) {
        FailureKind::ModelNotFound
    } else if has(&[
        "500 ",
        "502",
        "503",
        "504",
        "unavailable",
        "overloaded",
        "timed out",
        "timeout",
        "connection",
        "network",
    ]) {
        FailureKind::Unavailable
    } else {
        FailureKind::Other
    }
}
