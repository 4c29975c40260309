//! Error types for the PDF Master server

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use pdfmaster_core::PdfToolError;
use thiserror::Error;
use tracing::error;

use crate::ui;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Tool(#[from] PdfToolError),

    #[error("Processing timed out after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Tool(err) if err.is_user_error() => StatusCode::BAD_REQUEST,
            ServerError::Tool(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", message);
        }

        (status, Html(ui::error_page(&message))).into_response()
    }
}
