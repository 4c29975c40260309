use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfToolError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfToolError {
    /// True when the failure was caused by the caller's input rather than
    /// by the environment (missing pdfium, write failures).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PdfToolError::ParseError(_)
                | PdfToolError::InvalidRange(_)
                | PdfToolError::InvalidInput(_)
                | PdfToolError::UnsupportedFormat(_)
                | PdfToolError::ImageError(_)
        )
    }
}

impl From<image::ImageError> for PdfToolError {
    fn from(err: image::ImageError) -> Self {
        PdfToolError::ImageError(err.to_string())
    }
}

impl From<zip::result::ZipError> for PdfToolError {
    fn from(err: zip::result::ZipError) -> Self {
        PdfToolError::OperationError(format!("Archive error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PdfToolError>;
