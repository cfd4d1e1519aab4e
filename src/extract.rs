//! Extraction entry points: PDFs in, one HTML fragment out.
//!
//! The whole batch becomes a single prompt, so there is exactly one model
//! invocation per call (with its own retries and fallbacks).

use crate::backend::resolve_backend;
use crate::category::SelectionSet;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::export::{self, ExportFormat};
use crate::output::{DocumentSummary, ExtractionOutput, ExtractionStats};
use crate::pipeline::text::{self, ExtractedDocument};
use crate::pipeline::{input, invoke, postprocess};
use crate::prompts::{self, NO_MATCH_HTML};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// One input to an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Local path or http(s) URL of a PDF.
    Pdf(String),
    /// Text that was already extracted, e.g. by an OCR step.
    Extracted(ExtractedDocument),
}

impl DocumentSource {
    pub fn name(&self) -> String {
        match self {
            DocumentSource::Pdf(source) => input::display_name(source),
            DocumentSource::Extracted(doc) => doc.name.clone(),
        }
    }
}

impl From<&str> for DocumentSource {
    fn from(s: &str) -> Self {
        DocumentSource::Pdf(s.to_string())
    }
}

impl From<String> for DocumentSource {
    fn from(s: String) -> Self {
        DocumentSource::Pdf(s)
    }
}

impl From<ExtractedDocument> for DocumentSource {
    fn from(doc: ExtractedDocument) -> Self {
        DocumentSource::Extracted(doc)
    }
}

/// Extract the selected question types from one or more PDFs.
///
/// # Errors
/// Preconditions are checked in this order, before any file is read or any
/// model is called:
/// 1. no inputs → [`ExtractError::NoFilesSelected`]
/// 2. empty selection → [`ExtractError::NoCategorySelected`]
/// 3. missing credential → [`ExtractError::MissingCredential`]
///
/// After that, input/PDF errors, [`ExtractError::PayloadTooLarge`], and the
/// invocation errors documented on [`invoke::invoke`].
///
/// # Example
/// ```rust,no_run
/// use exam_extract::{extract, ExtractionConfig, SelectionSet};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::builder()
///     .api_key(std::env::var("GEMINI_API_KEY")?)
///     .build()?;
/// let selection = SelectionSet::parse("purpose,blank")?;
/// let output = extract(&["2024_09_mock.pdf"], &selection, &config).await?;
/// println!("{}", output.html);
/// # Ok(())
/// # }
/// ```
pub async fn extract<S: AsRef<str>>(
    sources: &[S],
    selection: &SelectionSet,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let sources: Vec<DocumentSource> = sources
        .iter()
        .map(|s| DocumentSource::Pdf(s.as_ref().to_string()))
        .collect();
    extract_documents(&sources, selection, config).await
}

/// Like [`extract`], but accepts pre-extracted text as well as PDFs.
pub async fn extract_documents(
    sources: &[DocumentSource],
    selection: &SelectionSet,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    check_preconditions(sources, selection, config)?;

    let categories = selection.selected();
    info!(
        "Starting extraction: {} file(s), {} question type(s)",
        sources.len(),
        categories.len()
    );

    // ── Step 1: Text ─────────────────────────────────────────────────────
    let text_start = Instant::now();
    let documents = extract_text(sources, config).await?;
    let text_duration_ms = text_start.elapsed().as_millis() as u64;

    // ── Step 2: Prompt ───────────────────────────────────────────────────
    let combined = text::combine_documents(&documents);
    let prompt = prompts::build_prompt(&categories, &combined);
    let prompt_chars = prompt.chars().count();
    if prompt_chars > config.max_prompt_chars {
        return Err(ExtractError::PayloadTooLarge {
            size: prompt_chars,
            limit: config.max_prompt_chars,
        });
    }
    debug!("Prompt: {} chars", prompt_chars);

    // ── Step 3: Model ────────────────────────────────────────────────────
    let backend = resolve_backend(config)?;
    let llm_start = Instant::now();
    let invocation = invoke::invoke(
        backend.as_ref(),
        &prompt,
        &config.retry,
        config.progress_callback.as_ref(),
    )
    .await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 4: Cleanup ──────────────────────────────────────────────────
    let mut html = postprocess::clean_html(&invocation.html);
    if html.is_empty() {
        html = NO_MATCH_HTML.to_string();
    }

    let summaries: Vec<DocumentSummary> = documents
        .iter()
        .map(|d| DocumentSummary {
            name: d.name.clone(),
            pages: d.pages.len(),
            chars: d.char_count(),
        })
        .collect();

    let stats = ExtractionStats {
        documents: summaries.len(),
        pages: summaries.iter().map(|d| d.pages).sum(),
        prompt_chars,
        categories: categories.len(),
        total_input_tokens: invocation.input_tokens,
        total_output_tokens: invocation.output_tokens,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        text_duration_ms,
        llm_duration_ms,
    };

    info!(
        "Extraction complete with {}: {} chars of HTML, {}ms total",
        invocation.model,
        html.len(),
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        html,
        model: invocation.model,
        attempts: invocation.attempts,
        documents: summaries,
        stats,
    })
}

/// Extract the page text of every source, in order.
///
/// Does not need a credential or a backend.
pub async fn extract_text(
    sources: &[DocumentSource],
    config: &ExtractionConfig,
) -> Result<Vec<ExtractedDocument>, ExtractError> {
    let mut documents = Vec::with_capacity(sources.len());
    for source in sources {
        let doc = match source {
            DocumentSource::Extracted(doc) => doc.clone(),
            DocumentSource::Pdf(s) => {
                let resolved = input::resolve_input(s, config.download_timeout_secs).await?;
                let pages = text::extract_pages(resolved.path(), config.password.as_deref()).await?;
                ExtractedDocument::new(input::display_name(s), pages)
            }
        };
        info!("{}: {} page(s) of text", doc.name, doc.pages.len());
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_extracted(&doc.name, doc.pages.len());
        }
        documents.push(doc);
    }
    Ok(documents)
}

/// Extract and write the result to `output_path` in `format`.
///
/// Uses an atomic write (temp file + rename) so a failed run never leaves a
/// partial file behind.
pub async fn extract_to_file<S: AsRef<str>>(
    sources: &[S],
    selection: &SelectionSet,
    output_path: impl AsRef<Path>,
    format: ExportFormat,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(sources, selection, config).await?;
    let bytes = export::render(&output.html, format);
    export::write_export(output_path.as_ref(), &bytes)?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync<S: AsRef<str>>(
    sources: &[S],
    selection: &SelectionSet,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(sources, selection, config))
}

/// Checks that must pass before anything is read or sent.
pub fn check_preconditions(
    sources: &[DocumentSource],
    selection: &SelectionSet,
    config: &ExtractionConfig,
) -> Result<(), ExtractError> {
    if sources.is_empty() {
        return Err(ExtractError::NoFilesSelected);
    }
    if selection.is_empty() {
        return Err(ExtractError::NoCategorySelected);
    }
    config.check_credential()
}
