//! Interactive session state: uploaded files, question-type selection, and
//! the outcome of the last submission.
//!
//! A [`Session`] is what a front end binds to. All state changes go through
//! its methods so the status transitions stay consistent:
//!
//! ```text
//! Idle ──submit──▶ Processing ──ok──▶ Complete
//!                      │
//!                      ├──err──▶ Error
//!                      └──cancelled──▶ Idle
//! (any) ──reset──▶ Idle
//! ```

use crate::category::SelectionSet;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::{self, DocumentSource};
use crate::output::ExtractionOutput;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Session-scoped file identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

/// One file added to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub id: DocumentId,
    pub source: DocumentSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Processing,
    Complete,
    Error,
}

/// Result of the last submission, kept until [`Session::reset`].
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Complete(Box<ExtractionOutput>),
    Failed { message: String },
}

#[derive(Debug, Default)]
pub struct Session {
    files: Vec<UploadedDocument>,
    selection: SelectionSet,
    status: ProcessingStatus,
    outcome: Option<ExtractionOutcome>,
    error_message: Option<String>,
    next_id: u64,
}

impl Session {
    /// An empty session with every question type selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files in the given order and return their ids.
    pub fn add_files<I, S>(&mut self, sources: I) -> Vec<DocumentId>
    where
        I: IntoIterator<Item = S>,
        S: Into<DocumentSource>,
    {
        sources
            .into_iter()
            .map(|source| {
                let id = DocumentId(self.next_id);
                self.next_id += 1;
                self.files.push(UploadedDocument {
                    id,
                    source: source.into(),
                });
                id
            })
            .collect()
    }

    /// Remove the file with `id`. Returns whether anything was removed.
    pub fn remove_file(&mut self, id: DocumentId) -> bool {
        match self.files.iter().position(|f| f.id == id) {
            Some(pos) => {
                self.files.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn toggle_category(&mut self, id: &str) -> Result<bool, ExtractError> {
        self.selection.toggle(id)
    }

    pub fn toggle_all(&mut self) {
        self.selection.toggle_all();
    }

    /// Back to the initial state: no files, everything selected, no outcome.
    pub fn reset(&mut self) {
        self.files.clear();
        self.selection = SelectionSet::all();
        self.status = ProcessingStatus::Idle;
        self.outcome = None;
        self.error_message = None;
    }

    pub fn files(&self) -> &[UploadedDocument] {
        &self.files
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<&ExtractionOutcome> {
        self.outcome.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The HTML of a completed extraction.
    pub fn result_html(&self) -> Option<&str> {
        match self.outcome {
            Some(ExtractionOutcome::Complete(ref output)) => Some(&output.html),
            _ => None,
        }
    }

    /// Run the extraction over the current files and selection.
    ///
    /// Precondition failures (no files, no selection, no credential) move
    /// the session to `Error` with the user-facing message; nothing is read
    /// and no model is called.
    pub async fn submit(&mut self, config: &ExtractionConfig) -> Result<(), ExtractError> {
        if self.status == ProcessingStatus::Processing {
            return Err(ExtractError::AlreadyProcessing);
        }

        let sources: Vec<DocumentSource> = self.files.iter().map(|f| f.source.clone()).collect();

        if let Err(e) = extract::check_preconditions(&sources, &self.selection, config) {
            self.fail(&e);
            return Err(e);
        }

        self.outcome = None;
        self.error_message = None;

        let result = {
            let guard = ProcessingGuard::enter(&mut self.status);
            let result = extract::extract_documents(&sources, &self.selection, config).await;
            guard.disarm();
            result
        };

        match result {
            Ok(output) => {
                info!("Session complete: {} chars from {}", output.html.len(), output.model);
                self.status = ProcessingStatus::Complete;
                self.outcome = Some(ExtractionOutcome::Complete(Box::new(output)));
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn fail(&mut self, e: &ExtractError) {
        warn!("Session failed: {}", e);
        let message = e.to_string();
        self.status = ProcessingStatus::Error;
        self.error_message = Some(message.clone());
        self.outcome = Some(ExtractionOutcome::Failed { message });
    }
}

/// Holds the status at `Processing` while an extraction runs. If the
/// submit future is dropped before it finishes, the status goes back to
/// `Idle` so the session can be submitted again.
struct ProcessingGuard<'a> {
    status: &'a mut ProcessingStatus,
    armed: bool,
}

impl<'a> ProcessingGuard<'a> {
    fn enter(status: &'a mut ProcessingStatus) -> Self {
        *status = ProcessingStatus::Processing;
        Self { status, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Extraction cancelled before it finished");
            *self.status = ProcessingStatus::Idle;
        }
    }
}
