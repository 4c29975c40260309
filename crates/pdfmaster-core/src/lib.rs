//! PDF tool operations
//!
//! Every tool is a function from input bytes to output bytes, built on lopdf
//! for the PDF object model. Rasterization goes through the
//! [`render::PageRasterizer`] seam so callers can choose pdfium or a stand-in.
//!
//! - `merge_documents` / `split_document`: page-level document assembly
//! - `compress_document` / `rotate_document` / `protect_document`: whole-document rewrites
//! - `stamp_image`: draws a signature image onto a page
//! - `extract_text` / `convert`: text-based format conversions
//! - `images_to_pdf` / `render`: raster images in and out

pub mod compress;
pub mod convert;
pub mod document;
pub mod error;
pub mod images;
pub mod merge;
pub mod protect;
pub mod render;
pub mod rotate;
pub mod split;
pub mod stamp;
pub mod text;
pub mod tool;

pub use compress::{compress_document, CompressionReport};
pub use convert::{office_to_pdf, pdf_to_docx};
pub use error::{PdfToolError, Result};
pub use images::images_to_pdf;
pub use merge::merge_documents;
pub use protect::protect_document;
pub use render::{pdf_to_images, preview_page, PageRasterizer, PdfiumRasterizer, Preview};
pub use rotate::{rotate_document, Rotation};
pub use split::split_document;
pub use stamp::{stamp_image, StampPlacement};
pub use text::extract_text;
pub use tool::{ActiveTool, Tool, ToolInfo, ToolOutput};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32> {
    let doc = document::load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse a page range string like "1-3, 5, 8-10" against a document of
/// `page_count` pages.
///
/// Malformed parts are skipped and pages outside the document are dropped;
/// the result is sorted and deduplicated. Selecting nothing is an error.
pub fn parse_ranges(input: &str, page_count: u32) -> Result<Vec<u32>> {
    use std::collections::BTreeSet;

    let mut pages = BTreeSet::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let (Ok(start), Ok(end)) = (start.trim().parse::<u32>(), end.trim().parse::<u32>())
            else {
                continue;
            };
            let start = start.max(1);
            let end = end.min(page_count);
            pages.extend(start..=end);
        } else if let Ok(page) = part.parse::<u32>() {
            // Single page like "5"
            if (1..=page_count).contains(&page) {
                pages.insert(page);
            }
        }
    }

    if pages.is_empty() {
        return Err(PdfToolError::InvalidRange("No valid pages selected".into()));
    }

    Ok(pages.into_iter().collect())
}
