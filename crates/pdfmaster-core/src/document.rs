//! Shared lopdf plumbing: loading, saving, page geometry and page-tree
//! construction used by every tool.

use crate::error::{PdfToolError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Page attributes a page may inherit from its ancestors in the page tree
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A4 in points
pub const A4_WIDTH: f64 = 595.276;
pub const A4_HEIGHT: f64 = 841.89;

/// Parse PDF bytes
pub(crate) fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| PdfToolError::ParseError(e.to_string()))
}

/// Serialize a document into a fresh buffer
pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Look up a page object by its 1-based number
pub(crate) fn page_id(doc: &Document, page: u32) -> Result<ObjectId> {
    let pages = doc.get_pages();
    pages.get(&page).copied().ok_or_else(|| {
        PdfToolError::InvalidRange(format!(
            "Invalid page number: {} (document has {} pages)",
            page,
            pages.len()
        ))
    })
}

/// Resolve an attribute on the page or, failing that, on the nearest ancestor
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    // Parent chains are shallow; the bound guards against cyclic trees.
    let mut depth = 0;
    while let Some(id) = current {
        if depth > 64 {
            return None;
        }
        depth += 1;
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Width and height of a page's media box in points
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(id).ok().cloned(),
            other => Some(other),
        })
        .and_then(|obj| media_box_size(&obj))
        // Missing or malformed media boxes fall back to A4
        .unwrap_or((A4_WIDTH, A4_HEIGHT))
}

fn media_box_size(obj: &Object) -> Option<(f64, f64)> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f64(&arr[0])?;
    let lly = obj_to_f64(&arr[1])?;
    let urx = obj_to_f64(&arr[2])?;
    let ury = obj_to_f64(&arr[3])?;
    Some(((urx - llx).abs(), (ury - lly).abs()))
}

/// A page rectangle in default user space, normalised so `llx <= urx` and
/// `lly <= ury`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

/// The region a viewer shows: the crop box, else the media box, else A4
pub(crate) fn visible_box(doc: &Document, page_id: ObjectId) -> PageBox {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .into_iter()
        .find_map(|key| {
            let obj = match inherited_attribute(doc, page_id, key)? {
                Object::Reference(id) => doc.get_object(id).ok()?.clone(),
                other => other,
            };
            page_box(&obj)
        })
        .unwrap_or(PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: A4_WIDTH,
            ury: A4_HEIGHT,
        })
}

fn page_box(obj: &Object) -> Option<PageBox> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let coords: Vec<f64> = arr.iter().map(obj_to_f64).collect::<Option<_>>()?;
    Some(PageBox {
        llx: coords[0].min(coords[2]),
        lly: coords[1].min(coords[3]),
        urx: coords[0].max(coords[2]),
        ury: coords[1].max(coords[3]),
    })
}

/// The page's `/Rotate`, normalised to 0, 90, 180 or 270
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    let degrees = inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0);
    // Viewers ignore values that are not multiples of 90
    if degrees % 90 != 0 {
        return 0;
    }
    degrees.rem_euclid(360)
}

pub(crate) fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

/// Append drawing operators to a page so they run in default user space.
///
/// The existing content is wrapped in `q`/`Q` so an unbalanced graphics
/// state left behind by the page cannot displace the new drawing.
pub(crate) fn append_isolated_content(
    doc: &mut Document,
    page_id: ObjectId,
    operators: Vec<u8>,
) -> Result<()> {
    let existing = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| PdfToolError::OperationError(e.to_string()))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
        let mut closing = b"\nQ\n".to_vec();
        closing.extend(operators);
        let close = doc.add_object(Stream::new(Dictionary::new(), closing));
        contents.push(Object::Reference(close));
    } else {
        let stream = doc.add_object(Stream::new(Dictionary::new(), operators));
        contents.push(Object::Reference(stream));
    }

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfToolError::OperationError(e.to_string()))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Register an XObject on a page's resources under a name not yet in use.
///
/// Returns the resource name chosen.
pub(crate) fn add_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: &str,
    xobject_id: ObjectId,
) -> Result<String> {
    // Materialize the (possibly inherited or indirect) resources on the page
    let resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Reference(id)) => doc
            .get_dictionary(id)
            .map(Clone::clone)
            .unwrap_or_default(),
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut resources = resources;

    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map(Clone::clone)
            .unwrap_or_default(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut index = 1;
    let name = loop {
        let candidate = format!("{}{}", prefix, index);
        if !xobjects.has(candidate.as_bytes()) {
            break candidate;
        }
        index += 1;
    };

    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfToolError::OperationError(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// Builds a document from scratch, page by page
pub(crate) struct DocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl DocumentBuilder {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub(crate) fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Add a page with the given size, content stream and resources
    pub(crate) fn add_page(
        &mut self,
        width: f64,
        height: f64,
        content: Vec<u8>,
        resources: Dictionary,
    ) -> ObjectId {
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(Object::Reference(page_id));
        page_id
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Write the page tree and catalog, compress and serialize
    pub(crate) fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        save(&mut self.doc)
    }
}
