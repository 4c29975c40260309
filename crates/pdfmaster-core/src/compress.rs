//! Lossless size reduction
//!
//! Removes unreachable objects and empty streams, renumbers what is left and
//! Flate-compresses every stream that is still stored raw.

use crate::document;
use crate::error::Result;

/// Result of a compression run
#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
}

impl CompressionReport {
    /// Size reduction relative to the input, in percent
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Rewrite a PDF as compactly as lopdf allows.
///
/// When the rewrite is not smaller than the input, the input is returned
/// unchanged so the tool never makes a file bigger.
pub fn compress_document(input: &[u8]) -> Result<CompressionReport> {
    let mut doc = document::load(input)?;

    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.renumber_objects();
    doc.compress();

    let output = document::save(&mut doc)?;
    let bytes = if output.len() < input.len() {
        output
    } else {
        input.to_vec()
    };

    Ok(CompressionReport {
        original_size: input.len(),
        compressed_size: bytes.len(),
        bytes,
    })
}
