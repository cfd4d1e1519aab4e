//! Post-processing: deterministic cleanup of model-generated HTML.
//!
//! Even when told to "output HTML only", models regularly wrap the answer
//! in a ```` ```html ```` fence, prepend a sentence of commentary, or return
//! a complete `<html>` document instead of a fragment. These rules remove
//! that packaging without touching the extracted content. Each rule is a
//! pure `&str → String` function and is tested on its own.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw text; the body is unwrapped before the preamble check so a
//! `<!DOCTYPE>` line is never mistaken for commentary.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw model output.
///
/// 1. Strip an outer code fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Unwrap `<body>` when a full document was returned
/// 4. Drop a plain-text preamble before the first tag
/// 5. Trim trailing whitespace per line
/// 6. Collapse 3+ consecutive blank lines down to 1
/// 7. Strip invisible Unicode (zero-width spaces, BOM, …)
/// 8. Trim the whole fragment
pub fn clean_html(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = unwrap_body(&s);
    let s = strip_preamble(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Unwrap full documents ────────────────────────────────────────────

static RE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").unwrap());

fn unwrap_body(input: &str) -> String {
    match RE_BODY.captures(input) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 4: Drop commentary before the first tag ─────────────────────────────
//
// Only whole leading lines without any `<` are dropped, and only when a
// later line starts with a tag. Text-only answers are left alone.

fn strip_preamble(input: &str) -> String {
    let trimmed = input.trim_start();
    if trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    match lines.iter().position(|l| l.trim_start().starts_with('<')) {
        Some(first_tag) if lines[..first_tag].iter().all(|l| !l.contains('<')) => {
            lines[first_tag..].join("\n")
        }
        _ => input.to_string(),
    }
}

// ── Rule 5: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 7: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_fence() {
        let input = "```html\n<h2>글의 목적</h2>\n```";
        assert_eq!(strip_code_fences(input), "<h2>글의 목적</h2>");
    }

    #[test]
    fn test_strip_bare_fence() {
        let input = "```\n<p>x</p>\n```\n";
        assert_eq!(strip_code_fences(input), "<p>x</p>");
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(strip_code_fences("<p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn test_unwrap_body() {
        let doc = "<!DOCTYPE html><html><head><title>t</title></head>\n<body class=\"a\">\n<h2>A</h2>\n</body></html>";
        assert_eq!(unwrap_body(doc).trim(), "<h2>A</h2>");
    }

    #[test]
    fn test_strip_preamble() {
        let input = "Here are the extracted questions:\n\n<h2>빈칸 추론</h2>";
        assert_eq!(strip_preamble(input), "<h2>빈칸 추론</h2>");
    }

    #[test]
    fn test_preamble_kept_for_text_only() {
        let input = "No questions matched.";
        assert_eq!(strip_preamble(input), input);
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("<p>a</p>\n\n\n\n<p>b</p>"), "<p>a</p>\n\n<p>b</p>");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn test_clean_html_leaves_fragment_untouched() {
        let html = "<h2>글의 목적</h2><div>...</div>";
        assert_eq!(clean_html(html), html);
    }

    #[test]
    fn test_clean_html_full_pipeline() {
        let raw = "```html\r\nSure!\r\n<h2>어법</h2>   \r\n\r\n\r\n\r\n<div class=\"question-item\">29.</div>\r\n```";
        assert_eq!(
            clean_html(raw),
            "<h2>어법</h2>\n\n<div class=\"question-item\">29.</div>"
        );
    }
}
