//! Plain paragraph typesetting onto A4 pages with the built-in Helvetica.

use crate::document::{DocumentBuilder, A4_HEIGHT, A4_WIDTH};
use crate::error::{PdfToolError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, StringFormat};
use tracing::debug;

pub(crate) const FONT_SIZE: f64 = 10.0;
pub(crate) const LEADING: f64 = 12.0;
pub(crate) const PARAGRAPH_SPACING: f64 = 10.0;
pub(crate) const MARGIN: f64 = 72.0;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // p..~
];

/// Map a char to its WinAnsiEncoding byte; unmappable chars become `?`
pub(crate) fn win_ansi_byte(c: char) -> u8 {
    match c {
        '\t' => b' ',
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

fn byte_width(byte: u8) -> u16 {
    match byte {
        32..=126 => HELVETICA_WIDTHS[usize::from(byte - 32)],
        0x85 | 0x89 | 0x97 | 0x99 => 1000,
        // Accented Latin letters are close to the average lowercase width
        _ => 556,
    }
}

/// Width of `text` in points at `size`
pub(crate) fn text_width(text: &str, size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| u32::from(byte_width(win_ansi_byte(c))))
        .sum();
    f64::from(units) * size / 1000.0
}

/// Greedy word wrap; words wider than a line are broken between chars
pub(crate) fn wrap_paragraph(text: &str, max_width: f64, size: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if text_width(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if text_width(word, size) <= max_width {
            current = word.to_string();
        } else {
            for c in word.chars() {
                let mut next = current.clone();
                next.push(c);
                if !current.is_empty() && text_width(&next, size) > max_width {
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                } else {
                    current = next;
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lay paragraphs out top to bottom, starting new pages as needed.
///
/// Blank paragraphs are skipped. With nothing to print the result is a
/// single empty page.
pub(crate) fn typeset(paragraphs: &[String]) -> Result<Vec<u8>> {
    let line_width = A4_WIDTH - 2.0 * MARGIN;
    let top = A4_HEIGHT - MARGIN - FONT_SIZE;

    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut ops: Vec<Operation> = Vec::new();
    let mut y = top;

    for paragraph in paragraphs.iter().filter(|p| !p.trim().is_empty()) {
        for line in wrap_paragraph(paragraph, line_width, FONT_SIZE) {
            if y < MARGIN {
                pages.push(std::mem::take(&mut ops));
                y = top;
            }
            let encoded: Vec<u8> = line.chars().map(win_ansi_byte).collect();
            ops.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Real(FONT_SIZE as f32)]),
                Operation::new(
                    "Td",
                    vec![Object::Real(MARGIN as f32), Object::Real(y as f32)],
                ),
                Operation::new("Tj", vec![Object::String(encoded, StringFormat::Hexadecimal)]),
                Operation::new("ET", vec![]),
            ]);
            y -= LEADING;
        }
        y -= PARAGRAPH_SPACING;
    }
    if !ops.is_empty() || pages.is_empty() {
        pages.push(ops);
    }

    let mut builder = DocumentBuilder::new();
    let font_id = builder.doc_mut().add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    for operations in pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| PdfToolError::OperationError(e.to_string()))?;
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        builder.add_page(A4_WIDTH, A4_HEIGHT, content, resources);
    }

    debug!(pages = builder.page_count(), "Typeset text document");
    builder.finish()
}
