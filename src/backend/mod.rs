//! Model backends: the only network dependency of the pipeline.
//!
//! [`ModelBackend`] is one logical operation — "generate content from a
//! prompt using a named model". Implementations attach a
//! [`FailureKind`](crate::error::FailureKind) to every failure where it is
//! observed, which is all the invocation wrapper needs to choose between
//! retrying, falling back and aborting.
//!
//! * [`gemini`] — Google Gemini REST API, classified from HTTP status.
//! * [`provider`] — any chat provider supported by `edgequake-llm`.

pub mod gemini;
pub mod provider;

use crate::config::{BackendKind, ExtractionConfig};
use crate::error::{BackendError, ExtractError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use gemini::GeminiBackend;
pub use provider::ProviderBackend;

/// A successful model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Raw text returned by the model. May be empty.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Generate content from a prompt with a named model.
pub trait ModelBackend: Send + Sync {
    /// Short name used in logs, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Masked credential for log lines (first 4 chars + `…`), if the backend holds one.
    fn credential_hint(&self) -> Option<String> {
        None
    }

    fn generate<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<Generation, BackendError>>;
}

/// Resolve the backend for a request, from most- to least-specific.
///
/// 1. A backend injected through the config is used as-is.
/// 2. Otherwise one is built from `backend_kind` and the credential.
///
/// The credential check happens here so that a missing key is reported
/// before any network attempt.
pub fn resolve_backend(config: &ExtractionConfig) -> Result<Arc<dyn ModelBackend>, ExtractError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    match config.backend_kind {
        BackendKind::Gemini => {
            let key = config.credential().ok_or(ExtractError::MissingCredential)?;
            let backend = GeminiBackend::new(key, config)?;
            Ok(Arc::new(backend))
        }
        BackendKind::Provider(ref name) => {
            // edgequake-llm reads provider keys from the environment itself
            Ok(Arc::new(ProviderBackend::new(name.clone(), config)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_without_key_is_missing_credential() {
        let config = ExtractionConfig::default();
        let err = resolve_backend(&config).err().expect("should fail");
        assert!(matches!(err, ExtractError::MissingCredential));
    }

    #[test]
    fn gemini_with_key_resolves() {
        let config = ExtractionConfig::builder().api_key("AIza-test").build().unwrap();
        let backend = resolve_backend(&config).expect("backend");
        assert_eq!(backend.name(), "gemini");
    }
}
