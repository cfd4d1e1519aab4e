//! Result types returned by the extraction entry points.

use crate::pipeline::invoke::InvocationAttempt;
use serde::{Deserialize, Serialize};

/// The outcome of a successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Cleaned HTML fragment: one `<h2>` section per matched category, or
    /// the "nothing matched" notice.
    pub html: String,

    /// The candidate model that produced `html`.
    pub model: String,

    /// Every model call made, including failures before the final success.
    pub attempts: Vec<InvocationAttempt>,

    /// Per-input summary of the extracted text.
    pub documents: Vec<DocumentSummary>,

    pub stats: ExtractionStats,
}

/// What was read from one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub pages: usize,
    pub chars: usize,
}

/// Aggregate statistics for one extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub documents: usize,
    pub pages: usize,
    /// Characters in the rendered prompt.
    pub prompt_chars: usize,
    pub categories: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub text_duration_ms: u64,
    pub llm_duration_ms: u64,
}
