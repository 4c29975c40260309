//! Page rotation

use crate::document;
use crate::error::{PdfToolError, Result};
use lopdf::Object;

/// Clockwise page rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 3] = [Rotation::Deg90, Rotation::Deg180, Rotation::Deg270];

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<i64> for Rotation {
    type Error = PdfToolError;

    fn try_from(degrees: i64) -> Result<Self> {
        match degrees {
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(PdfToolError::InvalidInput(format!(
                "Rotation must be 90, 180 or 270 degrees, got {}",
                other
            ))),
        }
    }
}

/// Set the rotation of every page to `rotation`.
///
/// The angle is absolute: a page already rotated by 90 degrees and rotated
/// with `Deg90` stays at 90.
pub fn rotate_document(bytes: &[u8], rotation: Rotation) -> Result<Vec<u8>> {
    let mut doc = document::load(bytes)?;

    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfToolError::OperationError(e.to_string()))?;
        page.set("Rotate", Object::Integer(rotation.degrees()));
    }

    document::save(&mut doc)
}
