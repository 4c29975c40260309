//! Plain-text extraction
//!
//! `pdf-extract` does the decoding since it follows `/ToUnicode` maps and
//! composite (Type0) fonts. lopdf's extractor is the fallback when it fails.

use crate::document;
use crate::error::Result;
use lopdf::Document;
use std::panic;
use tracing::warn;

/// Text of each page, in page order.
///
/// A page whose text cannot be decoded yields an empty string.
pub(crate) fn page_texts(bytes: &[u8], doc: &Document) -> Vec<String> {
    let page_count = doc.get_pages().len();

    // pdf-extract panics on some malformed font programs
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
        Ok(Ok(pages)) if pages.len() == page_count => return pages,
        Ok(Ok(pages)) => warn!(
            extracted = pages.len(),
            expected = page_count,
            "Page count mismatch in text extraction, falling back"
        ),
        Ok(Err(e)) => warn!(error = %e, "Text extraction failed, falling back"),
        Err(_) => warn!("Text extraction panicked, falling back"),
    }

    fallback_page_texts(doc)
}

fn fallback_page_texts(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .keys()
        .map(|&page| match doc.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page, error = %e, "Could not extract page text");
                String::new()
            }
        })
        .collect()
}

/// Extract the text of every page, each followed by a blank line
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let doc = document::load(bytes)?;
    let mut out = String::new();
    for text in page_texts(bytes, &doc) {
        out.push_str(&text);
        out.push_str("\n\n");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{identity_h_pdf, text_pdf};

    #[test]
    fn test_extract_text_keeps_page_order() {
        let text = extract_text(&text_pdf(3, "Extract")).unwrap();
        let first = text.find("Extract Page 1").unwrap();
        let second = text.find("Extract Page 2").unwrap();
        let third = text.find("Extract Page 3").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_extract_text_separates_pages() {
        let text = extract_text(&text_pdf(2, "Extract")).unwrap();
        assert!(text.ends_with("\n\n"));
        let page_break = text.find("\n\n").unwrap();
        assert!(page_break > text.find("Extract Page 1").unwrap());
    }

    #[test]
    fn test_extract_text_decodes_composite_fonts() {
        let text = extract_text(&identity_h_pdf("Hello")).unwrap();
        assert!(text.contains("Hello"), "got {:?}", text);
        assert!(!text.contains("Unimplemented"));
    }

    #[test]
    fn test_page_texts_one_entry_per_page() {
        let pdf = text_pdf(4, "Count");
        let doc = document::load(&pdf).unwrap();
        assert_eq!(page_texts(&pdf, &doc).len(), 4);
    }

    #[test]
    fn test_extract_text_rejects_garbage() {
        assert!(extract_text(b"nope").is_err());
    }
}
