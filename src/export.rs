//! Export of an extraction result: standalone HTML, Word-compatible
//! document, and a two-flavour clipboard payload.
//!
//! All renderers take the cleaned HTML fragment (possibly edited by the
//! user) and never touch the network or the model.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub const HTML_FILE_NAME: &str = "extracted_questions.html";
pub const HTML_MIME_TYPE: &str = "text/html";
pub const WORD_FILE_NAME: &str = "extracted_questions.doc";
pub const WORD_MIME_TYPE: &str = "application/msword";

/// Title of every exported document.
pub const DOCUMENT_TITLE: &str = "추출된 문제";

/// Stylesheet shared by the HTML and Word exports.
pub const STYLESHEET: &str = r#"
body {
  font-family: 'Malgun Gothic', 'Noto Sans KR', sans-serif;
  line-height: 1.6;
  max-width: 800px;
  margin: 2rem auto;
  padding: 0 1rem;
  color: #333;
  word-break: keep-all;
}
h2 {
  font-size: 1.5rem;
  color: #1e40af;
  border-bottom: 2px solid #e2e8f0;
  padding-bottom: 0.5rem;
  margin-top: 3rem;
  margin-bottom: 1.5rem;
}
.question-item {
  margin-bottom: 3rem;
  padding-bottom: 2rem;
  page-break-inside: avoid;
}
.source {
  font-size: 0.9rem;
  color: #666;
  margin-bottom: 0.5rem;
  font-weight: 500;
}
.question-title {
  font-weight: bold;
  font-size: 1.1em;
  margin-bottom: 1rem;
}
.passage {
  background-color: #f9f9f9;
  padding: 1.5rem;
  margin: 1rem 0;
  border-radius: 4px;
  border-left: 4px solid #e5e7eb;
  line-height: 1.8;
  font-size: 0.95em;
  text-align: justify;
}
.box {
  border: 1px solid #000;
  padding: 1rem;
  margin: 1rem 0;
  position: relative;
  background: #fff;
}
.choices {
  list-style-type: none;
  padding-left: 0;
  margin-top: 1rem;
}
.choices li {
  margin-bottom: 0.5rem;
  padding-left: 1.8rem;
  text-indent: -1.8rem;
}
.answer {
  margin-top: 1rem;
  padding: 1rem;
  border: 1px dashed #94a3b8;
  font-size: 0.9em;
}
img { max-width: 100%; height: auto; display: block; margin: 1rem auto; }
hr { border: 0; border-top: 1px dashed #ccc; margin: 2rem 0; }
"#;

/// Output flavour for [`render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Standalone styled HTML page.
    #[default]
    Html,
    /// HTML wrapped for Microsoft Word (`.doc`).
    Word,
    /// The bare fragment, no wrapper.
    Fragment,
}

impl ExportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Html | ExportFormat::Fragment => HTML_FILE_NAME,
            ExportFormat::Word => WORD_FILE_NAME,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Html | ExportFormat::Fragment => HTML_MIME_TYPE,
            ExportFormat::Word => WORD_MIME_TYPE,
        }
    }
}

/// Render `content` in the requested format.
pub fn render(content: &str, format: ExportFormat) -> Vec<u8> {
    match format {
        ExportFormat::Html => html_document(content).into_bytes(),
        ExportFormat::Word => word_document(content),
        ExportFormat::Fragment => content.as_bytes().to_vec(),
    }
}

/// A self-contained, styled HTML page around `content`.
pub fn html_document(content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<title>{DOCUMENT_TITLE}</title>\n\
<style>{STYLESHEET}</style>\n\
</head>\n\
<body>\n\
{content}\n\
</body>\n\
</html>\n"
    )
}

/// An HTML document Word opens natively, prefixed with a UTF-8 BOM so
/// Korean text is not read as the system code page.
pub fn word_document(content: &str) -> Vec<u8> {
    let html = format!(
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
xmlns:w=\"urn:schemas-microsoft-com:office:word\" \
xmlns=\"http://www.w3.org/TR/REC-html40\">\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<title>{DOCUMENT_TITLE}</title>\n\
<!--[if gte mso 9]><xml><w:WordDocument><w:View>Print</w:View><w:Zoom>100</w:Zoom></w:WordDocument></xml><![endif]-->\n\
<style>{STYLESHEET}</style>\n\
</head>\n\
<body>\n\
{content}\n\
</body>\n\
</html>\n"
    );
    let mut bytes = Vec::with_capacity(html.len() + 3);
    bytes.extend_from_slice(b"\xEF\xBB\xBF");
    bytes.extend_from_slice(html.as_bytes());
    bytes
}

/// Rich clipboard content: the HTML for editors that accept it, plain text
/// for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    pub html: String,
    pub plain_text: String,
}

pub fn clipboard_payload(content: &str) -> ClipboardPayload {
    ClipboardPayload {
        html: content.to_string(),
        plain_text: html_to_text(content),
    }
}

static RE_BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|ol|ul|tr|table|blockquote)\s*>").unwrap()
});
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Flatten an HTML fragment to readable text.
pub fn html_to_text(html: &str) -> String {
    let s = RE_BLOCK_END.replace_all(html, "\n");
    let s = RE_TAG.replace_all(&s, "");
    let s = decode_entities(&s);
    let s = s
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    RE_BLANK_LINES.replace_all(&s, "\n\n").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Write `bytes` to `path` atomically (temp file in the same directory,
/// then rename).
pub fn write_export(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let to_err = |e: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(to_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(to_err)?;
    tmp.write_all(bytes).map_err(to_err)?;
    tmp.persist(path).map_err(|e| to_err(e.error))?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
