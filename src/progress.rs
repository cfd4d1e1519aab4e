//! Progress-callback trait for extraction and invocation events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to follow
//! the pipeline: text extraction per file, then each model attempt, retry
//! wait and fallback. A retry wait is 10 s by default, so a front end that
//! shows nothing during it looks hung.
//!
//! # Example
//!
//! ```rust
//! use exam_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     attempts: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_attempt(&self, model: &str, attempt: u32, max_attempts: u32) {
//!         self.attempts.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{model}: attempt {attempt}/{max_attempts}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { attempts: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::FailureKind;
use std::sync::Arc;
use std::time::Duration;

/// Called by the extraction pipeline as it runs.
///
/// All methods default to no-ops so callers only override what they need.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Text extraction finished for one input.
    fn on_document_extracted(&self, source: &str, pages: usize) {
        let _ = (source, pages);
    }

    /// A model call is about to be sent. `attempt` is 1-indexed.
    fn on_attempt(&self, model: &str, attempt: u32, max_attempts: u32) {
        let _ = (model, attempt, max_attempts);
    }

    /// A transient failure; the same model will be retried after `delay`.
    fn on_retry_wait(&self, model: &str, kind: FailureKind, delay: Duration) {
        let _ = (model, kind, delay);
    }

    /// The wrapper gave up on `model` and moves to the next candidate.
    fn on_model_abandoned(&self, model: &str, kind: FailureKind) {
        let _ = (model, kind);
    }

    /// A model returned a response.
    fn on_success(&self, model: &str, html_len: usize) {
        let _ = (model, html_len);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_extracted("a.pdf", 4);
        cb.on_attempt("gemini-2.5-flash", 1, 4);
        cb.on_retry_wait("gemini-2.5-flash", FailureKind::RateLimited, Duration::from_secs(10));
        cb.on_model_abandoned("gemini-2.5-flash", FailureKind::RateLimited);
        cb.on_success("gemini-2.5-pro", 120);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ExtractionProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_attempt("m", 1, 1);
    }
}
