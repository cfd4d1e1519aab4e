//! # exam-extract
//!
//! Pull selected reading-comprehension question types (items 18–45) out of
//! Korean CSAT-style English exam PDFs and return them as structured HTML,
//! using a hosted language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF(s)
//!  │
//!  ├─ 1. Input    resolve local files or download URLs, check %PDF magic
//!  ├─ 2. Text     per-page text via pdfium (spawn_blocking)
//!  ├─ 3. Prompt   fixed editor template + selected question types + text
//!  ├─ 4. Invoke   candidate models in order; transient failures retried
//!  │              after a fixed delay, missing models skipped, credential
//!  │              failures abort
//!  ├─ 5. Polish   strip fences / commentary around the HTML
//!  └─ 6. Export   styled HTML, Word (.doc), or HTML + plain-text clipboard
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam_extract::{extract, ExtractionConfig, SelectionSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let selection = SelectionSet::parse("blank,order,insertion")?;
//!     let output = extract(&["2024_09_mock.pdf"], &selection, &config).await?;
//!     println!("{}", output.html);
//!     eprintln!("answered by {} after {} attempt(s)", output.model, output.attempts.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam-extract` binary (clap + anyhow + tracing-subscriber + arboard) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! exam-extract = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod category;
pub mod config;
pub mod credential;
pub mod error;
pub mod export;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Generation, ModelBackend};
pub use category::{Category, SelectionSet, CATEGORIES};
pub use config::{BackendKind, ExtractionConfig, ExtractionConfigBuilder, RetryPolicy};
pub use credential::CredentialStore;
pub use error::{BackendError, ExtractError, FailureKind};
pub use export::{ClipboardPayload, ExportFormat};
pub use extract::{extract, extract_documents, extract_sync, extract_text, extract_to_file, DocumentSource};
pub use output::{DocumentSummary, ExtractionOutput, ExtractionStats};
pub use pipeline::invoke::{invoke, Invocation, InvocationAttempt};
pub use pipeline::text::ExtractedDocument;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{DocumentId, ExtractionOutcome, ProcessingStatus, Session, UploadedDocument};
