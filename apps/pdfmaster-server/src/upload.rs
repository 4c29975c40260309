//! Multipart form parsing for tool submissions

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use pdfmaster_core::StampPlacement;
use tracing::debug;

use crate::error::ServerError;

/// Bodies over the configured limit surface here while streaming
fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::InvalidRequest(e.body_text())
    }
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A submitted tool form: documents (`file`/`files`), the signature
/// `image`, and every other field as text.
#[derive(Debug, Default)]
pub struct ToolForm {
    pub files: Vec<UploadedFile>,
    pub image: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl ToolForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = ToolForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "files" | "image" => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(multipart_error)?;
                    // Browsers send an empty part for an untouched file input
                    if bytes.is_empty() {
                        continue;
                    }
                    debug!(field = %name, filename = %filename, size = bytes.len(), "Received upload");
                    let upload = UploadedFile {
                        filename,
                        bytes: bytes.to_vec(),
                    };
                    if name == "image" {
                        form.image = Some(upload);
                    } else {
                        form.files.push(upload);
                    }
                }
                _ => {
                    let value = field
                        .text()
                        .await
                        .map_err(multipart_error)?;
                    form.insert_field(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Values are never logged: the protect tool sends a password here
    fn insert_field(&mut self, name: String, value: String) {
        debug!(field = %name, len = value.len(), "Received form field");
        self.fields.insert(name, value);
    }

    /// The one document the tool works on
    pub fn single_file(&self) -> Result<&UploadedFile, ServerError> {
        self.files
            .first()
            .ok_or_else(|| ServerError::InvalidRequest("Please upload a file".into()))
    }

    /// All uploaded documents, in upload order
    pub fn take_files(&mut self) -> Result<Vec<UploadedFile>, ServerError> {
        if self.files.is_empty() {
            return Err(ServerError::InvalidRequest(
                "Please upload at least one file".into(),
            ));
        }
        Ok(std::mem::take(&mut self.files))
    }

    pub fn image(&self) -> Result<&UploadedFile, ServerError> {
        self.image
            .as_ref()
            .ok_or_else(|| ServerError::InvalidRequest("Please upload a signature image".into()))
    }

    /// A text field, trimmed; blank counts as missing
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A text field exactly as sent, for values where whitespace matters
    pub fn raw_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn required_field(&self, name: &str) -> Result<&str, ServerError> {
        self.field(name)
            .ok_or_else(|| ServerError::InvalidRequest(format!("Missing field: {}", name)))
    }

    /// Parse a field, falling back to `default` when it is absent
    pub fn parse_field<T: FromStr>(&self, name: &str, default: T) -> Result<T, ServerError> {
        match self.field(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| ServerError::InvalidRequest(format!("Invalid value for {}: {}", name, raw))),
        }
    }

    /// Signature placement from `page`, `x`, `y` and `width`
    pub fn placement(&self) -> Result<StampPlacement, ServerError> {
        let defaults = StampPlacement::default();
        Ok(StampPlacement {
            page: self.parse_field("page", defaults.page)?,
            x: self.parse_field("x", defaults.x)?,
            y: self.parse_field("y", defaults.y)?,
            width: self.parse_field("width", defaults.width)?,
        })
    }
}
