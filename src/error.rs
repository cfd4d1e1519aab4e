//! Error types for the exam-extract library.
//!
//! Two layers of failure exist:
//!
//! * [`BackendError`] — a single model call failed. It carries a
//!   [`FailureKind`] assigned where the failure was observed (HTTP status,
//!   provider error), so the invocation wrapper never has to re-derive the
//!   classification from message text.
//!
//! * [`ExtractError`] — **Fatal** for one extraction request: a precondition
//!   failed, the input could not be read, or every candidate model was
//!   exhausted. Returned as `Err(ExtractError)` from the `extract*` entry
//!   points and shown to the user as a single message.
//!
//! [`ExtractError::kind`] exposes the backend classification that an error
//! was derived from, so it survives any wrapping done above the invocation
//! layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP 429 / quota exhausted.
    RateLimited,
    /// 5xx, timeout, connection reset.
    Unavailable,
    /// The named model does not exist or does not support the call.
    ModelNotFound,
    /// Bad or unauthorised credential.
    Permission,
    /// The request body exceeds what the backend accepts.
    PayloadTooLarge,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Whether the same model is worth retrying after a delay.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::RateLimited | FailureKind::Unavailable)
    }

    /// Whether the failure makes every remaining candidate pointless.
    pub fn is_systemic(self) -> bool {
        matches!(
            self,
            FailureKind::Permission | FailureKind::PayloadTooLarge | FailureKind::Other
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::RateLimited => "rate limit / quota",
            FailureKind::Unavailable => "temporarily unavailable",
            FailureKind::ModelNotFound => "model not found",
            FailureKind::Permission => "permission denied",
            FailureKind::PayloadTooLarge => "payload too large",
            FailureKind::Other => "unclassified",
        };
        f.write_str(s)
    }
}

/// A single failed model call.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

const QUOTA_GUIDANCE: &str = "API 사용량 한도를 초과했습니다. 무료 등급은 분당 요청 수가 제한되어 있습니다.\n\
1분 정도 기다린 후 다시 시도하거나, 결제가 연결된 API 키를 사용해주세요.";

const MODEL_GUIDANCE: &str = "사용 가능한 모델을 찾을 수 없습니다. API 키에 해당 모델 사용 권한이 있는지,\n\
Google AI Studio에서 발급한 키인지 확인해주세요.";

const PERMISSION_GUIDANCE: &str = "API 키가 유효하지 않거나 권한이 없습니다. API 키를 다시 확인해주세요.";

const GENERIC_GUIDANCE: &str = "문제 추출 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// All fatal errors returned by the exam-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Preconditions ─────────────────────────────────────────────────────
    /// No credential was configured; reported before any network attempt.
    #[error("API 키를 입력해주세요.")]
    MissingCredential,

    #[error("최소한 하나의 PDF 파일을 업로드해주세요.")]
    NoFilesSelected,

    #[error("최소한 하나의 문제 유형을 선택해주세요.")]
    NoCategorySelected,

    /// A category id that is not in the catalogue.
    #[error("Unknown question type '{id}'. Run with --list-types to see valid ids.")]
    InvalidCategory { id: String },

    /// A second submission while one is still running.
    #[error("An extraction is already in progress.")]
    AlreadyProcessing,

    // ── Input errors ──────────────────────────────────────────────────────
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not be downloaded or bound.
    #[error(
        "PDF 텍스트 추출 라이브러리를 불러오지 못했습니다: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    ExtractionLibraryUnavailable(String),

    /// The rendered prompt is larger than the configured limit.
    #[error("PDF 내용이 너무 큽니다 ({size} 자, 최대 {limit} 자). 파일 수를 줄여서 다시 시도해주세요.")]
    PayloadTooLarge { size: usize, limit: usize },

    // ── Backend errors ────────────────────────────────────────────────────
    /// Credential rejected; remaining candidates were not tried.
    #[error("{}\n(model '{model}': {detail})", PERMISSION_GUIDANCE)]
    Permission { model: String, detail: String },

    /// A failure that would repeat on every candidate; the loop stopped.
    #[error("{}\n(model '{model}', {kind}: {detail})", GENERIC_GUIDANCE)]
    Backend {
        model: String,
        kind: FailureKind,
        detail: String,
    },

    /// Every candidate model failed; classified by the last error.
    #[error("{}\n(last model '{model}', {kind}: {detail})", exhausted_guidance(.kind))]
    ModelsExhausted {
        kind: FailureKind,
        model: String,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential store error at '{path}': {detail}")]
    CredentialStore { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn exhausted_guidance(kind: &FailureKind) -> &'static str {
    match kind {
        FailureKind::RateLimited => QUOTA_GUIDANCE,
        FailureKind::ModelNotFound | FailureKind::Permission => MODEL_GUIDANCE,
        _ => GENERIC_GUIDANCE,
    }
}

impl ExtractError {
    /// The backend classification this error was derived from, if any.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ExtractError::Permission { .. } => Some(FailureKind::Permission),
            ExtractError::PayloadTooLarge { .. } => Some(FailureKind::PayloadTooLarge),
            ExtractError::Backend { kind, .. } | ExtractError::ModelsExhausted { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }

    /// True for the checks performed before any extraction or network call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ExtractError::MissingCredential
                | ExtractError::NoFilesSelected
                | ExtractError::NoCategorySelected
                | ExtractError::InvalidCategory { .. }
                | ExtractError::AlreadyProcessing
        )
    }
}
