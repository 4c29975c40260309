//! Text-level conversions between PDF and office formats.
//!
//! Both directions carry text only. Office → PDF typesets the paragraphs
//! onto A4 pages; PDF → DOCX writes one paragraph per extracted line.

mod docx;
mod layout;

use crate::document;
use crate::error::{PdfToolError, Result};
use crate::text::page_texts;
use std::path::Path;
use tracing::info;

/// Convert a `.docx` or `.txt` upload to PDF. The format is chosen by the
/// extension of `filename`.
pub fn office_to_pdf(bytes: &[u8], filename: &str) -> Result<Vec<u8>> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let paragraphs = match extension.as_str() {
        "docx" => docx::read_paragraphs(bytes)?,
        "txt" => text_lines(bytes)?,
        _ => {
            return Err(PdfToolError::UnsupportedFormat(format!(
                "{} (expected .docx or .txt)",
                filename
            )))
        }
    };

    info!(
        format = %extension,
        paragraphs = paragraphs.len(),
        "Converting document to PDF"
    );
    layout::typeset(&paragraphs)
}

fn text_lines(bytes: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| PdfToolError::InvalidInput("Text file is not valid UTF-8".into()))?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    Ok(text.lines().map(str::to_string).collect())
}

/// Convert a PDF's text to a `.docx`, one page per section break
pub fn pdf_to_docx(bytes: &[u8]) -> Result<Vec<u8>> {
    let doc = document::load(bytes)?;
    let pages = page_texts(bytes, &doc);

    let page_size = doc
        .get_pages()
        .values()
        .next()
        .map(|&id| document::page_size(&doc, id))
        .unwrap_or((document::A4_WIDTH, document::A4_HEIGHT));

    info!(pages = pages.len(), "Converting PDF to DOCX");
    docx::write_document(&pages, page_size)
}
