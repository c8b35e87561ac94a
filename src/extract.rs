//! Text extraction for indexable document files.
//!
//! Plain text and Markdown are read as UTF-8 (lossily); PDFs go through
//! `pdf-extract`. Extraction never panics: a failure is returned and the
//! index builder skips the file.

use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Content type for a file name, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        MIME_PDF
    } else if lower.ends_with(".md") || lower.ends_with(".markdown") {
        MIME_MARKDOWN
    } else {
        MIME_TEXT
    }
}

/// Extracts plain text from file content.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
            .map(|text| normalize_whitespace(&text))
            .map_err(|e| ExtractError::Pdf(e.to_string())),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

/// PDF text comes back with form feeds and runs of blank lines; collapse
/// them so the chunker sees ordinary paragraphs.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.replace('\u{c}', "\n").lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
