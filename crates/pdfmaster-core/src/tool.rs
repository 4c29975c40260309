//! The tool catalogue and the shape of a tool's result

use crate::error::PdfToolError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One of the supported document operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Merge,
    Split,
    Sign,
    Compress,
    Protect,
    Rotate,
    ExtractText,
    PdfJpg,
    JpgPdf,
    OfficePdf,
    PdfDocx,
}

impl Tool {
    /// Every tool, in the order the home grid shows them
    pub const ALL: [Tool; 11] = [
        Tool::Merge,
        Tool::Split,
        Tool::Sign,
        Tool::Compress,
        Tool::Protect,
        Tool::Rotate,
        Tool::ExtractText,
        Tool::PdfJpg,
        Tool::JpgPdf,
        Tool::OfficePdf,
        Tool::PdfDocx,
    ];

    /// Identifier used in URLs
    pub fn id(self) -> &'static str {
        match self {
            Tool::Merge => "merge",
            Tool::Split => "split",
            Tool::Sign => "sign",
            Tool::Compress => "compress",
            Tool::Protect => "protect",
            Tool::Rotate => "rotate",
            Tool::ExtractText => "extract_text",
            Tool::PdfJpg => "pdf_jpg",
            Tool::JpgPdf => "jpg_pdf",
            Tool::OfficePdf => "office_pdf",
            Tool::PdfDocx => "pdf_docx",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tool::Merge => "Merge PDF",
            Tool::Split => "Split PDF",
            Tool::Sign => "Sign PDF",
            Tool::Compress => "Compress",
            Tool::Protect => "Protect",
            Tool::Rotate => "Rotate",
            Tool::ExtractText => "Extract Text",
            Tool::PdfJpg => "PDF to JPG",
            Tool::JpgPdf => "JPG to PDF",
            Tool::OfficePdf => "Word to PDF",
            Tool::PdfDocx => "PDF to Word",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::Merge => "Combine files.",
            Tool::Split => "Extract pages.",
            Tool::Sign => "Place a signature.",
            Tool::Compress => "Reduce the size.",
            Tool::Protect => "Add a password.",
            Tool::Rotate => "Turn the pages.",
            Tool::ExtractText => "PDF to TXT.",
            Tool::PdfJpg => "Convert to images.",
            Tool::JpgPdf => "Images into a PDF.",
            Tool::OfficePdf => "Simple DOCX to PDF.",
            Tool::PdfDocx => "Convert to DOCX.",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Tool::Merge => "🔗",
            Tool::Split => "✂️",
            Tool::Sign => "✍️",
            Tool::Compress => "🗜️",
            Tool::Protect => "🔒",
            Tool::Rotate => "🔄",
            Tool::ExtractText => "📝",
            Tool::PdfJpg => "🖼️",
            Tool::JpgPdf => "📷",
            Tool::OfficePdf => "📄",
            Tool::PdfDocx => "📘",
        }
    }

    /// `accept` attribute for the tool's upload field
    pub fn accepts(self) -> &'static str {
        match self {
            Tool::JpgPdf => ".jpg,.jpeg,.png",
            Tool::OfficePdf => ".docx,.txt",
            _ => ".pdf",
        }
    }

    /// Whether the tool takes several uploads at once
    pub fn multiple_files(self) -> bool {
        matches!(self, Tool::Merge | Tool::JpgPdf)
    }

    pub fn info(self) -> ToolInfo {
        ToolInfo {
            id: self.id(),
            title: self.title(),
            description: self.description(),
            icon: self.icon(),
            accepts: self.accepts(),
            multiple_files: self.multiple_files(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = PdfToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.id() == s)
            .ok_or_else(|| PdfToolError::InvalidInput(format!("Unknown tool: {}", s)))
    }
}

/// Catalogue entry served to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub accepts: &'static str,
    pub multiple_files: bool,
}

/// What the UI is showing: the tool grid or a single tool's form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTool {
    #[default]
    Home,
    Tool(Tool),
}

impl FromStr for ActiveTool {
    type Err = PdfToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "home" => Ok(ActiveTool::Home),
            other => other.parse().map(ActiveTool::Tool),
        }
    }
}

/// A finished download
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub bytes: Vec<u8>,
    pub filename: &'static str,
    pub mime: &'static str,
    /// Extra response headers, e.g. the compression ratio
    pub headers: Vec<(&'static str, String)>,
}

impl ToolOutput {
    fn new(bytes: Vec<u8>, filename: &'static str, mime: &'static str) -> Self {
        Self {
            bytes,
            filename,
            mime,
            headers: Vec::new(),
        }
    }

    pub fn pdf(bytes: Vec<u8>, filename: &'static str) -> Self {
        Self::new(bytes, filename, "application/pdf")
    }

    pub fn text(text: String, filename: &'static str) -> Self {
        Self::new(text.into_bytes(), filename, "text/plain; charset=utf-8")
    }

    pub fn zip(bytes: Vec<u8>, filename: &'static str) -> Self {
        Self::new(bytes, filename, "application/zip")
    }

    pub fn docx(bytes: Vec<u8>, filename: &'static str) -> Self {
        Self::new(
            bytes,
            filename,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        )
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}
