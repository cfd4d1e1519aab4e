//! Configuration types for question extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The retry/fallback knobs are grouped
//! in [`RetryPolicy`] because the invocation wrapper needs nothing else.

use crate::backend::ModelBackend;
use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default candidate models, cheapest/fastest first.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro"];

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Model fallback order and per-model retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Candidate model ids, tried in order.
    pub models: Vec<String>,

    /// Retries per model in addition to the first attempt. Default: 3.
    pub max_retries: u32,

    /// Fixed wait between retries of the same model. Default: 10 s.
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            max_retries: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// Which backend implementation to build when none is injected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Google Gemini REST API (default).
    #[default]
    Gemini,
    /// Any provider known to `edgequake-llm` (openai, anthropic, ollama, …).
    Provider(String),
}

/// Configuration for one extraction request.
///
/// # Example
/// ```rust
/// use exam_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("AIza-example")
///     .models(["gemini-2.5-flash", "gemini-2.5-pro"])
///     .max_retries(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Credential for the backend. Required unless a backend is injected.
    pub api_key: Option<String>,

    /// Candidate models and retry budget.
    pub retry: RetryPolicy,

    /// Backend selection when `backend` is `None`.
    pub backend_kind: BackendKind,

    /// Pre-constructed backend. Takes precedence over `backend_kind`.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Gemini endpoint base URL.
    pub api_base: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction must be verbatim; low temperature keeps the model from
    /// paraphrasing passages.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 65 536.
    ///
    /// A full exam's worth of passages can run to tens of thousands of
    /// tokens; a low cap silently truncates the last category.
    pub max_output_tokens: u32,

    /// Per-call HTTP timeout in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Upper bound on the rendered prompt, in characters. Default: 1 500 000.
    pub max_prompt_chars: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Receives attempt / retry / fallback events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            retry: RetryPolicy::default(),
            backend_kind: BackendKind::default(),
            backend: None,
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: 0.1,
            max_output_tokens: 65_536,
            request_timeout_secs: 300,
            download_timeout_secs: 120,
            max_prompt_chars: 1_500_000,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("retry", &self.retry)
            .field("backend_kind", &self.backend_kind)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ModelBackend>"))
            .field("api_base", &self.api_base)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured credential, treating a blank string as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether a Gemini credential must be present before submitting.
    ///
    /// An injected backend replaces the transport, not the credential, so
    /// the requirement follows `backend_kind` alone. Provider backends read
    /// their keys from the environment.
    pub fn requires_credential(&self) -> bool {
        self.backend_kind == BackendKind::Gemini
    }

    /// Fail with [`ExtractError::MissingCredential`] when a required
    /// credential is absent.
    pub fn check_credential(&self) -> Result<(), ExtractError> {
        if self.requires_credential() && self.credential().is_none() {
            return Err(ExtractError::MissingCredential);
        }
        Ok(())
    }
}

/// Show only the first four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}…")
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.retry.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.retry_delay = delay;
        self
    }

    pub fn backend_kind(mut self, kind: BackendKind) -> Self {
        self.config.backend_kind = kind;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_prompt_chars = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing credential is not a build error: it is reported when an
    /// extraction is submitted, before any network attempt.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.retry.models.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "At least one candidate model is required".into(),
            ));
        }
        if c.retry.models.iter().any(|m| m.trim().is_empty()) {
            return Err(ExtractError::InvalidConfig(
                "Candidate model ids must not be blank".into(),
            ));
        }
        if c.max_prompt_chars == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_prompt_chars must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
