//! PDF Split algorithm
//!
//! Extracts pages from a PDF by deleting everything else.

use crate::document;
use crate::error::{PdfToolError, Result};
use std::collections::HashSet;

/// Split a PDF, extracting only the specified pages (1-indexed)
///
/// 1. Validate the requested pages against the document
/// 2. Delete every page not in the whitelist
/// 3. Prune objects that are no longer reachable
/// 4. Compress and serialize
pub fn split_document(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(PdfToolError::InvalidRange("No pages specified".into()));
    }

    // Validate page numbers are > 0
    if pages.contains(&0) {
        return Err(PdfToolError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }

    let mut doc = document::load(bytes)?;

    let page_count = doc.get_pages().len() as u32;

    // Validate all page numbers exist
    for &page in pages {
        if page > page_count {
            return Err(PdfToolError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                page, page_count
            )));
        }
    }

    let pages_to_keep: HashSet<u32> = pages.iter().copied().collect();
    let pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| !pages_to_keep.contains(p))
        .collect();

    if !pages_to_delete.is_empty() {
        doc.delete_pages(&pages_to_delete);
    }

    // Drop objects only the deleted pages referenced
    doc.prune_objects();
    doc.compress();

    document::save(&mut doc)
}
