//! HTTP handlers for the PDF Master server
//!
//! Pages:
//! - `GET /` tool grid, `GET /tools/{id}` tool form
//! - `POST /tools/{id}` runs a tool and returns the download
//! - `POST /tools/sign/preview` renders the signed page
//!
//! JSON and preview endpoints live under `/api`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{Html, IntoResponse, Response},
    Json,
};
use pdfmaster_core::{
    compress_document, extract_text, get_page_count, images_to_pdf, merge_documents,
    office_to_pdf, parse_ranges, pdf_to_docx, pdf_to_images, preview_page, protect_document,
    render::{EXPORT_DPI, PREVIEW_DPI},
    rotate_document, split_document, stamp_image, ActiveTool, PageRasterizer, Rotation, Tool,
    ToolInfo, ToolOutput,
};
use serde::Serialize;
use tracing::info;

use crate::error::ServerError;
use crate::ui;
use crate::upload::ToolForm;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfmaster-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Tool list response
#[derive(Serialize)]
pub struct ToolListResponse {
    pub success: bool,
    pub tools: Vec<ToolInfo>,
    pub count: usize,
}

/// Handler: GET /api/tools
pub async fn handle_list_tools() -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = Tool::ALL.into_iter().map(Tool::info).collect();
    let count = tools.len();
    Json(ToolListResponse {
        success: true,
        tools,
        count,
    })
}

/// Handler: GET /
pub async fn handle_home() -> Html<String> {
    Html(ui::page(ActiveTool::Home))
}

pub(crate) fn parse_tool(id: &str) -> Result<Tool, ServerError> {
    match id.parse::<ActiveTool>() {
        Ok(ActiveTool::Tool(tool)) => Ok(tool),
        _ => Err(ServerError::ToolNotFound(id.to_string())),
    }
}

/// Handler: GET /tools/{id}
pub async fn handle_tool_page(Path(id): Path<String>) -> Result<Html<String>, ServerError> {
    let tool = parse_tool(&id)?;
    Ok(Html(ui::page(ActiveTool::Tool(tool))))
}

/// Handler: POST /tools/{id}
pub async fn handle_run_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let tool = parse_tool(&id)?;
    let form = ToolForm::from_multipart(multipart).await?;
    info!(
        tool = %tool,
        files = form.files.len(),
        bytes = form.files.iter().map(|f| f.bytes.len()).sum::<usize>(),
        "Running tool"
    );

    let rasterizer = Arc::clone(&state.rasterizer);
    let output = run_blocking(state.timeout_ms, move || {
        execute(tool, form, rasterizer.as_ref())
    })
    .await?;

    info!(tool = %tool, filename = output.filename, size = output.bytes.len(), "Tool finished");
    attachment(output)
}

/// Handler: POST /tools/sign/preview
///
/// Applies the signature and returns the stamped page as PNG, so the
/// placement can be checked before downloading.
pub async fn handle_sign_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let form = ToolForm::from_multipart(multipart).await?;
    let rasterizer = Arc::clone(&state.rasterizer);

    let preview = run_blocking(state.timeout_ms, move || {
        let placement = form.placement()?;
        let signed = stamp_image(&form.single_file()?.bytes, &form.image()?.bytes, placement)?;
        Ok(preview_page(&signed, rasterizer.as_ref(), placement.page, PREVIEW_DPI)?)
    })
    .await?;

    Ok(png_response(preview.png, preview.page_count))
}

/// Handler: POST /api/preview
///
/// First page of the uploaded `file` as PNG; the page count is sent in
/// the `x-page-count` header.
pub async fn handle_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let form = ToolForm::from_multipart(multipart).await?;
    let rasterizer = Arc::clone(&state.rasterizer);

    let preview = run_blocking(state.timeout_ms, move || {
        Ok(preview_page(
            &form.single_file()?.bytes,
            rasterizer.as_ref(),
            1,
            PREVIEW_DPI,
        )?)
    })
    .await?;

    Ok(png_response(preview.png, preview.page_count))
}

/// Run CPU-bound work off the async runtime, bounded by `timeout_ms`
async fn run_blocking<T, F>(timeout_ms: u64, job: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        tokio::task::spawn_blocking(job),
    )
    .await;

    match result {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ServerError::Internal(format!(
            "Tool task panicked: {}",
            join_error
        ))),
        Err(_timeout) => Err(ServerError::Timeout(timeout_ms)),
    }
}

/// Run `tool` on a submitted form
pub(crate) fn execute(
    tool: Tool,
    mut form: ToolForm,
    rasterizer: &dyn PageRasterizer,
) -> Result<ToolOutput, ServerError> {
    let output = match tool {
        Tool::Merge => {
            let documents = form.take_files()?.into_iter().map(|f| f.bytes).collect();
            ToolOutput::pdf(merge_documents(documents)?, "merged.pdf")
        }
        Tool::Split => {
            let file = form.single_file()?;
            let ranges = form.required_field("ranges")?;
            let pages = parse_ranges(ranges, get_page_count(&file.bytes)?)?;
            ToolOutput::pdf(split_document(&file.bytes, &pages)?, "split.pdf")
        }
        Tool::Sign => {
            let signed = stamp_image(
                &form.single_file()?.bytes,
                &form.image()?.bytes,
                form.placement()?,
            )?;
            ToolOutput::pdf(signed, "signed.pdf")
        }
        Tool::Compress => {
            let report = compress_document(&form.single_file()?.bytes)?;
            let reduction = format!("{:.1}", report.reduction_percent());
            ToolOutput::pdf(report.bytes, "compressed.pdf").with_header("x-size-reduction", reduction)
        }
        Tool::Protect => {
            let password = form
                .raw_field("password")
                .ok_or_else(|| ServerError::InvalidRequest("Please enter a password".into()))?;
            ToolOutput::pdf(
                protect_document(&form.single_file()?.bytes, password)?,
                "protected.pdf",
            )
        }
        Tool::Rotate => {
            let rotation = Rotation::try_from(form.parse_field::<i64>("angle", 90)?)?;
            ToolOutput::pdf(
                rotate_document(&form.single_file()?.bytes, rotation)?,
                "rotated.pdf",
            )
        }
        Tool::ExtractText => {
            ToolOutput::text(extract_text(&form.single_file()?.bytes)?, "content.txt")
        }
        Tool::PdfJpg => ToolOutput::zip(
            pdf_to_images(&form.single_file()?.bytes, rasterizer, EXPORT_DPI)?,
            "images.zip",
        ),
        Tool::JpgPdf => {
            let images = form.take_files()?.into_iter().map(|f| f.bytes).collect();
            ToolOutput::pdf(images_to_pdf(images)?, "photos.pdf")
        }
        Tool::OfficePdf => {
            let file = form.single_file()?;
            ToolOutput::pdf(office_to_pdf(&file.bytes, &file.filename)?, "document.pdf")
        }
        Tool::PdfDocx => {
            ToolOutput::docx(pdf_to_docx(&form.single_file()?.bytes)?, "converted.docx")
        }
    };
    Ok(output)
}

fn header_value(value: &str) -> Result<HeaderValue, ServerError> {
    HeaderValue::from_str(value)
        .map_err(|e| ServerError::Internal(format!("Invalid header value: {}", e)))
}

/// Turn a tool result into a download response
fn attachment(output: ToolOutput) -> Result<Response, ServerError> {
    let mut response = output.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, header_value(output.mime)?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&format!("attachment; filename=\"{}\"", output.filename))?,
    );
    for (name, value) in output.headers {
        headers.insert(HeaderName::from_static(name), header_value(&value)?);
    }
    Ok(response)
}

fn png_response(png: Vec<u8>, page_count: u32) -> Response {
    let mut response = png.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        HeaderName::from_static("x-page-count"),
        HeaderValue::from(page_count),
    );
    response
}
