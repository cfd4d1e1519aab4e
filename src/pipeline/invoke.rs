//! Resilient multi-model invocation: ordered fallback plus fixed-delay retry.
//!
//! The loop is written as an explicit state machine so the policy can be
//! read in one place ([`next_step`]) and tested without a backend:
//!
//! ```text
//!            ┌──────── transient, retries left ────────┐
//!            ▼                                         │
//! TryModel(i) ──fail──▶ next_step ──▶ Retry(i, k) ─────┘ (wait retry_delay)
//!      │                   │
//!      │ ok                ├── not found / retries spent ──▶ NextModel(i+1) ──▶ TryModel(i+1)
//!      ▼                   │                                      │ no more
//!   Success                └── permission / other ──▶ Fatal       ▼
//!                                                           aggregate error
//! ```
//!
//! Each call starts again from the first candidate; nothing is remembered
//! between invocations.

use crate::backend::{Generation, ModelBackend};
use crate::config::RetryPolicy;
use crate::error::{BackendError, ExtractError, FailureKind};
use crate::progress::ProgressCallback;
use crate::prompts::NO_MATCH_HTML;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// State of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// First attempt on candidate `i`.
    TryModel(usize),
    /// Retry number `k` (1-based) on candidate `i`, after the fixed delay.
    Retry(usize, u32),
    /// Move on to candidate `i`; past the end means every candidate failed.
    NextModel(usize),
    Success,
    /// Stop without trying the remaining candidates.
    Fatal,
}

/// Decide what follows a failed attempt on candidate `index`.
///
/// `retries_used` is how many retries candidate `index` has already had.
pub fn next_step(index: usize, retries_used: u32, max_retries: u32, kind: FailureKind) -> Step {
    if kind.is_systemic() {
        Step::Fatal
    } else if kind.is_transient() && retries_used < max_retries {
        Step::Retry(index, retries_used + 1)
    } else {
        Step::NextModel(index + 1)
    }
}

/// One model call and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationAttempt {
    pub model: String,
    /// 1-indexed attempt number on this model.
    pub attempt: u32,
    /// `None` on success.
    pub error: Option<BackendError>,
}

/// A successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Model output, or [`NO_MATCH_HTML`] when the model returned nothing.
    pub html: String,
    /// The candidate that answered.
    pub model: String,
    pub attempts: Vec<InvocationAttempt>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Run `prompt` against the candidate models in `policy`.
///
/// # Errors
/// * [`ExtractError::Permission`] — credential rejected; later candidates
///   were not tried.
/// * [`ExtractError::Backend`] — an unclassified or size failure that would
///   repeat on every candidate.
/// * [`ExtractError::ModelsExhausted`] — every candidate failed; classified
///   by the last error seen.
pub async fn invoke(
    backend: &dyn ModelBackend,
    prompt: &str,
    policy: &RetryPolicy,
    progress: Option<&ProgressCallback>,
) -> Result<Invocation, ExtractError> {
    if policy.models.is_empty() {
        return Err(ExtractError::InvalidConfig(
            "At least one candidate model is required".into(),
        ));
    }

    let start = Instant::now();
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempts: Vec<InvocationAttempt> = Vec::new();
    let mut last_error: Option<(String, BackendError)> = None;
    let mut answer: Option<(String, Generation)> = None;
    let mut step = Step::TryModel(0);

    loop {
        step = match step {
            Step::TryModel(index) | Step::Retry(index, _) => {
                let retry = match step {
                    Step::Retry(_, k) => k,
                    _ => 0,
                };
                let attempt = retry.saturating_add(1);
                let model = policy.models[index].as_str();

                if retry > 0 {
                    let kind = last_error.as_ref().map_or(FailureKind::Other, |(_, e)| e.kind);
                    warn!(
                        "{}: retry {}/{} after {:?} ({})",
                        model, retry, policy.max_retries, policy.retry_delay, kind
                    );
                    if let Some(cb) = progress {
                        cb.on_retry_wait(model, kind, policy.retry_delay);
                    }
                    sleep(policy.retry_delay).await;
                }

                if let Some(cb) = progress {
                    cb.on_attempt(model, attempt, max_attempts);
                }
                info!(
                    "Calling {} model {} (attempt {}/{}, key {})",
                    backend.name(),
                    model,
                    attempt,
                    max_attempts,
                    backend.credential_hint().as_deref().unwrap_or("none")
                );

                match backend.generate(model, prompt).await {
                    Ok(generation) => {
                        attempts.push(InvocationAttempt {
                            model: model.to_string(),
                            attempt,
                            error: None,
                        });
                        answer = Some((model.to_string(), generation));
                        Step::Success
                    }
                    Err(e) => {
                        warn!("{}: attempt {} failed: {}", model, attempt, e);
                        attempts.push(InvocationAttempt {
                            model: model.to_string(),
                            attempt,
                            error: Some(e.clone()),
                        });
                        let next = next_step(index, retry, policy.max_retries, e.kind);
                        if matches!(next, Step::NextModel(_)) {
                            if let Some(cb) = progress {
                                cb.on_model_abandoned(model, e.kind);
                            }
                        }
                        last_error = Some((model.to_string(), e));
                        next
                    }
                }
            }
            Step::NextModel(index) if index < policy.models.len() => {
                debug!("Falling back to {}", policy.models[index]);
                Step::TryModel(index)
            }
            Step::NextModel(_) => return Err(exhausted(last_error)),
            Step::Fatal => return Err(fatal(last_error)),
            Step::Success => {
                let (model, generation) = answer
                    .take()
                    .ok_or_else(|| ExtractError::Internal("success without a response".into()))?;

                let html = if generation.text.trim().is_empty() {
                    NO_MATCH_HTML.to_string()
                } else {
                    generation.text
                };
                if let Some(cb) = progress {
                    cb.on_success(&model, html.len());
                }
                info!(
                    "{} answered after {} attempt(s): {} in / {} out tokens",
                    model,
                    attempts.len(),
                    generation.input_tokens,
                    generation.output_tokens
                );

                return Ok(Invocation {
                    html,
                    model,
                    attempts,
                    input_tokens: generation.input_tokens,
                    output_tokens: generation.output_tokens,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
        };
    }
}

fn exhausted(last_error: Option<(String, BackendError)>) -> ExtractError {
    match last_error {
        Some((model, e)) => ExtractError::ModelsExhausted {
            kind: e.kind,
            model,
            detail: e.message,
        },
        None => ExtractError::Internal("no candidate model was attempted".into()),
    }
}

fn fatal(last_error: Option<(String, BackendError)>) -> ExtractError {
    match last_error {
        Some((model, e)) if e.kind == FailureKind::Permission => ExtractError::Permission {
            model,
            detail: e.message,
        },
        Some((model, e)) => ExtractError::Backend {
            model,
            kind: e.kind,
            detail: e.message,
        },
        None => ExtractError::Internal("fatal state without an error".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_retry_until_budget_spent() {
        assert_eq!(next_step(0, 0, 3, FailureKind::RateLimited), Step::Retry(0, 1));
        assert_eq!(next_step(0, 2, 3, FailureKind::Unavailable), Step::Retry(0, 3));
        assert_eq!(next_step(0, 3, 3, FailureKind::RateLimited), Step::NextModel(1));
    }

    #[test]
    fn not_found_falls_through_without_retry() {
        assert_eq!(next_step(1, 0, 3, FailureKind::ModelNotFound), Step::NextModel(2));
    }

    #[test]
    fn systemic_failures_abort() {
        for kind in [FailureKind::Permission, FailureKind::Other, FailureKind::PayloadTooLarge] {
            assert_eq!(next_step(0, 0, 3, kind), Step::Fatal, "{kind:?}");
        }
    }

    #[test]
    fn zero_retry_budget_moves_on_immediately() {
        assert_eq!(next_step(0, 0, 0, FailureKind::RateLimited), Step::NextModel(1));
    }

    struct Answers;

    impl ModelBackend for Answers {
        fn name(&self) -> &str {
            "answers"
        }

        fn generate<'a>(
            &'a self,
            _model: &'a str,
            _prompt: &'a str,
        ) -> futures::future::BoxFuture<'a, Result<Generation, BackendError>> {
            Box::pin(async { Ok(Generation::text("<p>18.</p>")) })
        }
    }

    #[test]
    fn unbounded_retry_budget_does_not_overflow() {
        let policy = RetryPolicy {
            models: vec!["m".into()],
            max_retries: u32::MAX,
            retry_delay: std::time::Duration::ZERO,
        };
        let invocation = tokio_test::block_on(invoke(&Answers, "prompt", &policy, None)).unwrap();
        assert_eq!(invocation.model, "m");
        assert_eq!(invocation.attempts.len(), 1);
        assert_eq!(invocation.attempts[0].attempt, 1);
        assert_eq!(next_step(0, u32::MAX - 1, u32::MAX, FailureKind::RateLimited), Step::Retry(0, u32::MAX));
        assert_eq!(next_step(0, u32::MAX, u32::MAX, FailureKind::RateLimited), Step::NextModel(1));
    }

    #[test]
    fn fatal_permission_maps_to_permission_error() {
        let err = fatal(Some((
            "gemini-2.5-flash".into(),
            BackendError::new(FailureKind::Permission, "403"),
        )));
        assert!(matches!(err, ExtractError::Permission { ref model, .. } if model == "gemini-2.5-flash"));
    }
}
