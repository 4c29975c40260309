//! Signature stamping: draw an image onto one page of a document.

use crate::document;
use crate::error::{PdfToolError, Result};
use crate::images::embed_image;
use tracing::debug;

/// Where to draw the stamp.
///
/// Coordinates are in points with the origin at the top-left corner of the
/// page as a viewer shows it (after cropping and `/Rotate`), matching how
/// the form presents them. The height follows from the
/// image's aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampPlacement {
    /// 1-based page number
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

impl Default for StampPlacement {
    fn default() -> Self {
        Self {
            page: 1,
            x: 100.0,
            y: 500.0,
            width: 150.0,
        }
    }
}

/// Draw `image` onto the page given by `placement`
pub fn stamp_image(pdf: &[u8], image: &[u8], placement: StampPlacement) -> Result<Vec<u8>> {
    if !(placement.width.is_finite() && placement.width > 0.0) {
        return Err(PdfToolError::InvalidInput(
            "Stamp width must be positive".into(),
        ));
    }
    if !(placement.x.is_finite() && placement.y.is_finite()) {
        return Err(PdfToolError::InvalidInput(
            "Stamp position must be a number".into(),
        ));
    }

    let mut doc = document::load(pdf)?;
    let page_id = document::page_id(&doc, placement.page)?;

    let embedded = embed_image(&mut doc, image)?;
    let aspect = f64::from(embedded.height) / f64::from(embedded.width);
    let height = placement.width * aspect;

    let matrix = placement_matrix(
        document::visible_box(&doc, page_id),
        document::page_rotation(&doc, page_id),
        placement,
        height,
    );

    let name = document::add_xobject(&mut doc, page_id, "ImStamp", embedded.id)?;
    debug!(
        page = placement.page,
        x = placement.x,
        y = placement.y,
        width = placement.width,
        height,
        "Placing stamp"
    );

    let [a, b, c, d, e, f] = matrix;
    let operators = format!(
        "q {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} cm /{} Do Q\n",
        a, b, c, d, e, f, name
    );
    document::append_isolated_content(&mut doc, page_id, operators.into_bytes())?;

    document::save(&mut doc)
}

/// The `cm` matrix taking the image's unit square to `placement`, given in
/// top-left display coordinates, so the image shows upright on a page with
/// the given crop box and rotation.
fn placement_matrix(
    page: document::PageBox,
    rotation: i64,
    placement: StampPlacement,
    height: f64,
) -> [f64; 6] {
    let StampPlacement { x, y, width: w, .. } = placement;
    match rotation {
        90 => [0.0, w, -height, 0.0, page.llx + y + height, page.lly + x],
        180 => [-w, 0.0, 0.0, -height, page.urx - x, page.lly + y + height],
        270 => [0.0, -w, height, 0.0, page.urx - y - height, page.ury - x],
        _ => [w, 0.0, 0.0, height, page.llx + x, page.ury - y - height],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{png_bytes, text_pdf};
    use lopdf::{content::Content, Document, Object};

    fn stamped_page_ops(pdf: &[u8], page: u32) -> Vec<lopdf::content::Operation> {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = *doc.get_pages().get(&page).unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        Content::decode(&content).unwrap().operations
    }

    fn stamp_matrix(ops: &[lopdf::content::Operation]) -> Vec<f64> {
        let cm = ops.iter().rev().find(|op| op.operator == "cm").unwrap();
        cm.operands
            .iter()
            .map(|o| match o {
                Object::Integer(i) => *i as f64,
                Object::Real(r) => f64::from(*r),
                _ => panic!("unexpected operand"),
            })
            .collect()
    }

    /// `text_pdf(1, ..)` with page 1 given `extra` entries
    fn single_page_with(extra: Vec<(&str, Object)>) -> Vec<u8> {
        let mut doc = Document::load_mem(&text_pdf(1, "Sign")).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        for (key, value) in extra {
            page.set(key, value);
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 0.01, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_stamp_draws_image_on_requested_page() {
        let pdf = text_pdf(2, "Sign");
        let placement = StampPlacement {
            page: 2,
            x: 100.0,
            y: 500.0,
            width: 150.0,
        };
        let stamped = stamp_image(&pdf, &png_bytes(100, 50), placement).unwrap();

        let ops = stamped_page_ops(&stamped, 2);
        let values = stamp_matrix(&ops);
        // 150 wide, 75 high, top edge 500pt below the top of a 792pt page
        assert_eq!(values[0], 150.0);
        assert_eq!(values[3], 75.0);
        assert_eq!(values[4], 100.0);
        assert_eq!(values[5], 792.0 - 500.0 - 75.0);

        assert!(ops.iter().any(|op| op.operator == "Do"));
        assert!(!stamped_page_ops(&stamped, 1).iter().any(|op| op.operator == "Do"));
    }

    #[test]
    fn test_stamp_measures_from_crop_box_corner() {
        let crop: Vec<Object> = vec![50.into(), 100.into(), 562.into(), 742.into()];
        let pdf = single_page_with(vec![("CropBox", crop.into())]);
        let placement = StampPlacement {
            page: 1,
            x: 10.0,
            y: 20.0,
            width: 100.0,
        };
        let stamped = stamp_image(&pdf, &png_bytes(100, 50), placement).unwrap();
        let values = stamp_matrix(&stamped_page_ops(&stamped, 1));
        // Left edge 10pt in from x=50, top edge 20pt down from y=742
        assert_close(&values, &[100.0, 0.0, 0.0, 50.0, 60.0, 742.0 - 20.0 - 50.0]);
    }

    #[test]
    fn test_stamp_follows_page_rotation() {
        let placement = StampPlacement {
            page: 1,
            x: 10.0,
            y: 20.0,
            width: 100.0,
        };
        // 612 x 792 media box; image 100 x 50
        let cases: [(i64, [f64; 6]); 4] = [
            (0, [100.0, 0.0, 0.0, 50.0, 10.0, 722.0]),
            (90, [0.0, 100.0, -50.0, 0.0, 70.0, 10.0]),
            (-90, [0.0, -100.0, 50.0, 0.0, 542.0, 782.0]),
            (180, [-100.0, 0.0, 0.0, -50.0, 602.0, 70.0]),
        ];
        for (rotate, expected) in cases {
            let pdf = single_page_with(vec![("Rotate", rotate.into())]);
            let stamped = stamp_image(&pdf, &png_bytes(100, 50), placement).unwrap();
            assert_close(&stamp_matrix(&stamped_page_ops(&stamped, 1)), &expected);
        }
    }

    #[test]
    fn test_stamp_isolates_existing_content() {
        let pdf = text_pdf(1, "Sign");
        let stamped = stamp_image(&pdf, &png_bytes(10, 10), StampPlacement::default()).unwrap();
        let ops = stamped_page_ops(&stamped, 1);

        assert_eq!(ops.first().unwrap().operator, "q");
        let first_q_close = ops.iter().position(|op| op.operator == "Q").unwrap();
        let do_pos = ops.iter().position(|op| op.operator == "Do").unwrap();
        assert!(first_q_close < do_pos);
    }

    #[test]
    fn test_stamp_keeps_page_text() {
        let pdf = text_pdf(1, "Sign");
        let stamped = stamp_image(&pdf, &png_bytes(10, 10), StampPlacement::default()).unwrap();
        let doc = Document::load_mem(&stamped).unwrap();
        assert!(doc.extract_text(&[1]).unwrap().contains("Sign Page 1"));
    }

    #[test]
    fn test_stamp_rejects_page_out_of_range() {
        let pdf = text_pdf(2, "Sign");
        for page in [0, 3] {
            let placement = StampPlacement {
                page,
                ..StampPlacement::default()
            };
            let err = stamp_image(&pdf, &png_bytes(10, 10), placement).unwrap_err();
            assert!(matches!(err, PdfToolError::InvalidRange(_)));
            assert!(err.to_string().contains("Invalid page number"));
        }
    }

    #[test]
    fn test_stamp_rejects_non_positive_width() {
        let pdf = text_pdf(1, "Sign");
        let placement = StampPlacement {
            width: 0.0,
            ..StampPlacement::default()
        };
        assert!(matches!(
            stamp_image(&pdf, &png_bytes(10, 10), placement),
            Err(PdfToolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stamp_rejects_non_image() {
        let pdf = text_pdf(1, "Sign");
        assert!(matches!(
            stamp_image(&pdf, b"plain text", StampPlacement::default()),
            Err(PdfToolError::ImageError(_))
        ));
    }
}
