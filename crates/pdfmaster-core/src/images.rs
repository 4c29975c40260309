//! Raster images as PDF image XObjects, and the image → PDF tool.

use crate::document::DocumentBuilder;
use crate::error::{PdfToolError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{GenericImageView, ImageFormat};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tracing::debug;

/// An image stored in a document
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

/// Frame header of a JPEG file
#[derive(Debug, Clone, Copy, PartialEq)]
struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
    precision: u8,
}

/// Add an image XObject for `bytes` (any format the image crate decodes).
///
/// Baseline and progressive 8-bit gray/RGB JPEGs are embedded as-is with
/// `/DCTDecode`. Everything else is decoded and stored as Flate-compressed
/// RGB, with an `/SMask` when the image carries transparency.
pub(crate) fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    let format = image::guess_format(bytes)
        .map_err(|_| PdfToolError::ImageError("Unrecognized image format".into()))?;

    if format == ImageFormat::Jpeg {
        if let Some(frame) = jpeg_frame(bytes) {
            let color_space = match frame.components {
                1 => Some("DeviceGray"),
                3 => Some("DeviceRGB"),
                _ => None,
            };
            if let (Some(color_space), 8) = (color_space, frame.precision) {
                debug!(
                    width = frame.width,
                    height = frame.height,
                    "Embedding JPEG without re-encoding"
                );
                let stream = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => frame.width as i64,
                        "Height" => frame.height as i64,
                        "ColorSpace" => color_space,
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    bytes.to_vec(),
                )
                .with_compression(false);
                let id = doc.add_object(stream);
                return Ok(EmbeddedImage {
                    id,
                    width: frame.width,
                    height: frame.height,
                });
            }
        }
    }

    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(PdfToolError::ImageError("Image has no pixels".into()));
    }

    let rgba = img.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if img.color().has_alpha() && alpha.iter().any(|&a| a != 255) {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        )
        .with_compression(false);
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", smask_id);
    }

    let id = doc.add_object(Stream::new(image_dict, deflate(&rgb)?).with_compression(false));
    Ok(EmbeddedImage { id, width, height })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Find the SOF segment of a JPEG we can pass through to `/DCTDecode`
fn jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            // Fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // Markers without a length
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            // Start of scan or end of image before any frame header
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        if matches!(marker, 0xC0 | 0xC1 | 0xC2) {
            let segment = bytes.get(pos + 4..pos + 2 + len)?;
            if segment.len() < 6 {
                return None;
            }
            return Some(JpegFrame {
                precision: segment[0],
                height: u32::from(u16::from_be_bytes([segment[1], segment[2]])),
                width: u32::from(u16::from_be_bytes([segment[3], segment[4]])),
                components: segment[5],
            });
        }
        // Lossless and arithmetic-coded frames are not passed through
        if (0xC3..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return None;
        }
        pos += 2 + len;
    }
    None
}

/// Build a PDF with one page per image, each page the size of its image
/// at 72 dpi.
pub fn images_to_pdf(images: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(PdfToolError::InvalidInput("No images to convert".into()));
    }

    let mut builder = DocumentBuilder::new();
    for (i, bytes) in images.iter().enumerate() {
        let embedded = embed_image(builder.doc_mut(), bytes).map_err(|e| match e {
            PdfToolError::ImageError(msg) => {
                PdfToolError::ImageError(format!("Image {}: {}", i + 1, msg))
            }
            other => other,
        })?;

        let (w, h) = (f64::from(embedded.width), f64::from(embedded.height));
        let content = format!("q {} 0 0 {} 0 0 cm /Im1 Do Q", w, h).into_bytes();
        let resources = dictionary! {
            "XObject" => dictionary! { "Im1" => Object::Reference(embedded.id) },
        };
        builder.add_page(w, h, content, resources);
    }

    builder.finish()
}
