//! Minimal WordprocessingML reading and writing

use crate::error::{PdfToolError, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Paragraph texts of a `.docx`, in document order.
///
/// Runs are concatenated; `w:tab` becomes a tab and `w:br`/`w:cr` a space.
pub(crate) fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PdfToolError::InvalidInput(format!("Not a DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| PdfToolError::InvalidInput(format!("DOCX is missing {}", DOCUMENT_PART)))?
        .read_to_string(&mut xml)?;

    let malformed = |e: quick_xml::Error| PdfToolError::InvalidInput(format!("Malformed DOCX: {}", e));

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    // Paragraphs open around the cursor; text boxes nest one inside a run
    let mut open: Vec<String> = Vec::new();
    // Closed text-box paragraphs, emitted after the body paragraph holding them
    let mut nested = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(malformed)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match (e.local_name().as_ref(), open.last_mut()) {
                (b"tab", Some(paragraph)) => paragraph.push('\t'),
                (b"br" | b"cr", Some(paragraph)) => paragraph.push(' '),
                (b"p", None) => paragraphs.push(String::new()),
                (b"p", Some(_)) => nested.push(String::new()),
                _ => {}
            },
            Event::Text(e) if in_text => {
                let text = e.unescape().map_err(malformed)?;
                if let Some(paragraph) = open.last_mut() {
                    paragraph.push_str(&text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(paragraph) = open.pop() {
                        if open.is_empty() {
                            paragraphs.push(paragraph);
                            paragraphs.append(&mut nested);
                        } else {
                            nested.push(paragraph);
                        }
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Characters XML 1.0 cannot carry
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

fn paragraph_xml(text: &str) -> String {
    let clean: String = text.chars().filter(|&c| is_xml_char(c)).collect();
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape(clean.as_str())
    )
}

/// Write a `.docx` with one paragraph per non-blank line and a page break
/// between pages. `page_size` is in points.
pub(crate) fn write_document(pages: &[String], page_size: (f64, f64)) -> Result<Vec<u8>> {
    let mut body = String::new();
    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        }
        for line in page.lines().filter(|l| !l.trim().is_empty()) {
            body.push_str(&paragraph_xml(line.trim_end()));
        }
    }

    // Twentieths of a point
    let (width, height) = (
        (page_size.0 * 20.0).round() as i64,
        (page_size.1 * 20.0).round() as i64,
    );
    let document = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
            "{}",
            r#"<w:sectPr><w:pgSz w:w="{}" w:h="{}"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#,
            "</w:body></w:document>"
        ),
        body, width, height
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        (DOCUMENT_PART, document.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A bare-bones `.docx` whose body is `body_xml`
    pub(crate) fn docx_with_body(body_xml: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body_xml
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
        zip.start_file(DOCUMENT_PART, options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_paragraphs_joins_runs() {
        let docx = docx_with_body(
            r#"<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>world</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>A&amp;B</w:t><w:tab/><w:t>C</w:t></w:r></w:p>"#,
        );
        assert_eq!(
            read_paragraphs(&docx).unwrap(),
            vec!["Hello world".to_string(), String::new(), "A&B\tC".to_string()]
        );
    }

    #[test]
    fn test_read_paragraphs_keeps_text_around_text_boxes() {
        let docx = docx_with_body(concat!(
            r#"<w:p><w:r><w:t xml:space="preserve">Before </w:t></w:r>"#,
            r#"<w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p><w:p/></w:txbxContent></w:pict></w:r>"#,
            r#"<w:r><w:t xml:space="preserve"> After</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>Next</w:t></w:r></w:p>"#,
        ));
        assert_eq!(
            read_paragraphs(&docx).unwrap(),
            vec![
                "Before  After".to_string(),
                "Boxed".to_string(),
                String::new(),
                "Next".to_string(),
            ]
        );
    }

    #[test]
    fn test_read_paragraphs_rejects_non_zip() {
        assert!(matches!(
            read_paragraphs(b"plain text"),
            Err(PdfToolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_paragraphs_requires_document_part() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", FileOptions::default()).unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = read_paragraphs(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn test_write_document_escapes_and_breaks_pages() {
        let docx = write_document(
            &["Terms & <conditions>\n\nsecond line".into(), "Next page".into()],
            (612.0, 792.0),
        )
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(docx.clone())).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("Terms &amp; &lt;conditions&gt;"));
        assert!(xml.contains(r#"<w:br w:type="page"/>"#));
        assert!(xml.contains(r#"<w:pgSz w:w="12240" w:h="15840"/>"#));

        assert_eq!(
            read_paragraphs(&docx).unwrap(),
            vec![
                "Terms & <conditions>".to_string(),
                "second line".to_string(),
                " ".to_string(),
                "Next page".to_string(),
            ]
        );
    }

    #[test]
    fn test_write_document_drops_control_chars() {
        let docx = write_document(&["bell\u{7}here".into()], (595.0, 842.0)).unwrap();
        assert_eq!(read_paragraphs(&docx).unwrap(), vec!["bellhere".to_string()]);
    }
}
