//! Page text extraction via pdfium.
//!
//! pdfium is not safe to drive from async worker threads, so every call runs
//! on the blocking pool. The library itself is bound through `pdfium-auto`,
//! which downloads and caches the platform binary on first use.

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Text of one source document, one entry per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Display name used in page markers.
    pub name: String,
    pub pages: Vec<String>,
}

impl ExtractedDocument {
    pub fn new(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.chars().count()).sum()
    }
}

/// Extract the text of every page of a PDF.
pub async fn extract_pages(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<String>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Text extraction task panicked: {}", e)))?
}

fn extract_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<String>, ExtractError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| ExtractError::ExtractionLibraryUnavailable(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| map_load_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages ({})", total_pages, pdf_path.display());

    let mut texts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(text) => {
                let content = text.all();
                debug!("Page {}: {} chars", idx + 1, content.chars().count());
                texts.push(content);
            }
            Err(e) => {
                // A page without a text layer (scanned image) still counts
                warn!("Page {} has no extractable text: {:?}", idx + 1, e);
                texts.push(String::new());
            }
        }
    }

    Ok(texts)
}

fn map_load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> ExtractError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            ExtractError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        ExtractError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Concatenate documents into the single text block placed in the prompt.
///
/// ```text
/// === 파일: 2024_09.pdf ===
/// --- 2024_09.pdf / 페이지 1 ---
/// ...
/// ```
pub fn combine_documents(documents: &[ExtractedDocument]) -> String {
    let mut out = String::new();
    for doc in documents {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("=== 파일: {} ===\n", doc.name));
        for (i, page) in doc.pages.iter().enumerate() {
            out.push_str(&format!("--- {} / 페이지 {} ---\n", doc.name, i + 1));
            let body = page.trim_end();
            if !body.is_empty() {
                out.push_str(body);
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_marks_files_and_pages() {
        let docs = vec![
            ExtractedDocument::new("a.pdf", vec!["18. 다음 글의 목적으로\n".into(), "19.".into()]),
            ExtractedDocument::new("b.pdf", vec!["31. 빈칸에 들어갈 말".into()]),
        ];
        let combined = combine_documents(&docs);
        assert_eq!(
            combined,
            "=== 파일: a.pdf ===\n\
             --- a.pdf / 페이지 1 ---\n18. 다음 글의 목적으로\n\
             --- a.pdf / 페이지 2 ---\n19.\n\
             \n=== 파일: b.pdf ===\n\
             --- b.pdf / 페이지 1 ---\n31. 빈칸에 들어갈 말\n"
        );
    }

    #[test]
    fn empty_pages_keep_their_marker() {
        let docs = vec![ExtractedDocument::new("scan.pdf", vec![String::new()])];
        assert_eq!(
            combine_documents(&docs),
            "=== 파일: scan.pdf ===\n--- scan.pdf / 페이지 1 ---\n"
        );
    }

    #[test]
    fn char_count_counts_characters_not_bytes() {
        let doc = ExtractedDocument::new("x.pdf", vec!["글의".into(), "ab".into()]);
        assert_eq!(doc.char_count(), 4);
    }

    #[test]
    fn password_errors_are_mapped() {
        let path = Path::new("/tmp/locked.pdf");
        let err = map_load_error(path, None, PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(err, ExtractError::PasswordRequired { .. }));

        let err = map_load_error(path, Some("nope"), PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(err, ExtractError::WrongPassword { .. }));

        let err = map_load_error(path, None, PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::FormatError,
        ));
        assert!(matches!(err, ExtractError::CorruptPdf { .. }));
    }
}
