//! Rasterization: PDF pages to images
//!
//! Rendering sits behind [`PageRasterizer`]. The production implementation
//! drives pdfium through `pdfium-render`; the library is bound lazily on each
//! call so a missing libpdfium only fails the tools that need it.

use crate::error::{PdfToolError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use pdfium_render::prelude::*;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Resolution used for PDF → JPG exports
pub const EXPORT_DPI: u16 = 150;

/// Resolution used for on-screen previews
pub const PREVIEW_DPI: u16 = 100;

const JPEG_QUALITY: u8 = 85;

/// Renders PDF pages to RGB bitmaps
pub trait PageRasterizer: Send + Sync {
    /// Render the given 1-based pages, or every page when `pages` is `None`
    fn render(&self, pdf: &[u8], pages: Option<&[u32]>, dpi: u16) -> Result<Vec<RgbImage>>;

    /// Number of pages the renderer sees in `pdf`
    fn page_count(&self, pdf: &[u8]) -> Result<u32>;
}

/// pdfium-backed rasterizer
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    /// libpdfium file, or a directory holding it. `None` uses the system library.
    library: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library {
            Some(path) if path.is_dir() => Pdfium::bind_to_library(
                Pdfium::pdfium_platform_library_name_at_path(path),
            ),
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfToolError::RenderError(format!("Failed to load pdfium: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn render(&self, pdf: &[u8], pages: Option<&[u32]>, dpi: u16) -> Result<Vec<RgbImage>> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfToolError::ParseError(e.to_string()))?;

        // Only the requested pages are loaded
        let numbers: Vec<u32> = match pages {
            Some(wanted) => wanted.to_vec(),
            None => (1..=u32::from(document.pages().len())).collect(),
        };

        let mut images = Vec::with_capacity(numbers.len());
        for number in numbers {
            let page = number
                .checked_sub(1)
                .and_then(|index| u16::try_from(index).ok())
                .and_then(|index| document.pages().get(index).ok())
                .ok_or_else(|| {
                    PdfToolError::InvalidRange(format!("Invalid page number: {}", number))
                })?;

            let width_pt = page.width().value.max(1.0);
            let target_width = ((width_pt / 72.0) * f32::from(dpi)).round().max(1.0) as i32;
            let config = PdfRenderConfig::new().set_target_width(target_width);

            let image = page
                .render_with_config(&config)
                .map_err(|e| PdfToolError::RenderError(e.to_string()))?
                .as_image()
                .into_rgb8();
            debug!(page = number, width = image.width(), height = image.height(), "Rendered page");
            images.push(image);
        }
        Ok(images)
    }

    fn page_count(&self, pdf: &[u8]) -> Result<u32> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfToolError::ParseError(e.to_string()))?;
        Ok(document.pages().len() as u32)
    }
}

/// A rendered page ready for display
#[derive(Debug, Clone)]
pub struct Preview {
    pub png: Vec<u8>,
    pub page_count: u32,
}

/// Render one page (1-based) as PNG, along with the document's page count
pub fn preview_page(
    pdf: &[u8],
    rasterizer: &dyn PageRasterizer,
    page: u32,
    dpi: u16,
) -> Result<Preview> {
    let page_count = rasterizer.page_count(pdf)?;
    if page == 0 || page > page_count {
        return Err(PdfToolError::InvalidRange(format!(
            "Invalid page number: {} (document has {} pages)",
            page, page_count
        )));
    }

    let image = rasterizer
        .render(pdf, Some(&[page]), dpi)?
        .into_iter()
        .next()
        .ok_or_else(|| PdfToolError::RenderError("Renderer returned no image".into()))?;

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut png, ImageFormat::Png)?;

    Ok(Preview {
        png: png.into_inner(),
        page_count,
    })
}

/// Render every page as JPEG and pack them into a ZIP (`page_{n}.jpg`)
pub fn pdf_to_images(pdf: &[u8], rasterizer: &dyn PageRasterizer, dpi: u16) -> Result<Vec<u8>> {
    let images = rasterizer.render(pdf, None, dpi)?;
    if images.is_empty() {
        return Err(PdfToolError::InvalidInput("Document has no pages".into()));
    }
    info!(pages = images.len(), dpi, "Exporting pages as JPEG");

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (index, image) in images.iter().enumerate() {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(image)?;

        zip.start_file(format!("page_{}.jpg", index + 1), options)?;
        zip.write_all(&jpeg)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::text_pdf;
    use std::io::Read;
    use std::sync::Mutex;

    /// Paints each page a flat colour and records the requests it saw
    struct FlatRasterizer {
        calls: Mutex<Vec<(Option<Vec<u32>>, u16)>>,
    }

    impl FlatRasterizer {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageRasterizer for FlatRasterizer {
        fn render(&self, pdf: &[u8], pages: Option<&[u32]>, dpi: u16) -> Result<Vec<RgbImage>> {
            self.calls
                .lock()
                .unwrap()
                .push((pages.map(<[u32]>::to_vec), dpi));
            let count = self.page_count(pdf)?;
            Ok((1..=count)
                .filter(|n| pages.map_or(true, |p| p.contains(n)))
                .map(|_| RgbImage::from_pixel(8, 11, image::Rgb([255, 255, 255])))
                .collect())
        }

        fn page_count(&self, pdf: &[u8]) -> Result<u32> {
            crate::get_page_count(pdf)
        }
    }

    #[test]
    fn test_pdf_to_images_zips_one_jpeg_per_page() {
        let rasterizer = FlatRasterizer::new();
        let zip_bytes = pdf_to_images(&text_pdf(3, "Img"), &rasterizer, EXPORT_DPI).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        for n in 1..=3 {
            let mut entry = archive.by_name(&format!("page_{}.jpg", n)).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
        }

        let calls = rasterizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, None);
        assert_eq!(calls[0].1, EXPORT_DPI);
    }

    #[test]
    fn test_preview_renders_requested_page_as_png() {
        let rasterizer = FlatRasterizer::new();
        let preview = preview_page(&text_pdf(4, "Prev"), &rasterizer, 1, PREVIEW_DPI).unwrap();

        assert_eq!(preview.page_count, 4);
        assert_eq!(image::guess_format(&preview.png).unwrap(), ImageFormat::Png);
        let calls = rasterizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Some(vec![1]));
        assert_eq!(calls[0].1, PREVIEW_DPI);
    }

    #[test]
    fn test_preview_rejects_missing_page() {
        let rasterizer = FlatRasterizer::new();
        let result = preview_page(&text_pdf(1, "Prev"), &rasterizer, 2, PREVIEW_DPI);
        assert!(matches!(result, Err(PdfToolError::InvalidRange(_))));
    }

    #[test]
    fn test_pdfium_with_missing_library_is_render_error() {
        let rasterizer = PdfiumRasterizer::new(Some(PathBuf::from("/nonexistent/libpdfium.so")));
        let result = rasterizer.page_count(&text_pdf(1, "Lib"));
        assert!(matches!(result, Err(PdfToolError::RenderError(_))));
    }

    #[test]
    fn test_pdfium_renders_only_requested_pages() {
        let rasterizer = PdfiumRasterizer::default();
        // Needs libpdfium installed on the system
        if rasterizer.bind().is_err() {
            return;
        }
        let pdf = text_pdf(3, "Pick");
        let images = rasterizer.render(&pdf, Some(&[2]), 72).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].width(), 612);

        assert!(matches!(
            rasterizer.render(&pdf, Some(&[4]), 72),
            Err(PdfToolError::InvalidRange(_))
        ));
    }
}
