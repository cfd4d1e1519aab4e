//! Pipeline stages for question extraction.
//!
//! Each submodule implements exactly one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ (prompt) ──▶ invoke ──▶ postprocess
//! (URL/path) (pdfium)             (models)    (cleanup)
//! ```
//!
//! 1. [`input`]  — canonicalise the user-supplied path or URL to a local file
//! 2. [`text`]   — per-page text via pdfium; runs in `spawn_blocking`
//! 3. [`invoke`] — ordered model fallback with fixed-delay retry; the only
//!    stage with network I/O
//! 4. [`postprocess`] — strip the packaging models put around HTML

pub mod input;
pub mod invoke;
pub mod postprocess;
pub mod text;
