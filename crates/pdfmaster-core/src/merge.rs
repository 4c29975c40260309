//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::document::{self, INHERITABLE_KEYS};
use crate::error::{PdfToolError, Result};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Use the first document as the destination
/// 4. For each source document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append its pages to the destination page list
/// 5. Flatten every page directly under the destination root `Pages`,
///    copying inherited attributes onto the page first
/// 6. Prune orphaned catalogs and page-tree nodes, compress and return
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    if documents.is_empty() {
        return Err(PdfToolError::InvalidInput("No documents to merge".into()));
    }

    // Single document - return as-is
    if documents.len() == 1 {
        return Ok(documents.into_iter().next().unwrap_or_default());
    }

    // Load all documents first
    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(doc_bytes).map_err(|e| {
            PdfToolError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        loaded_docs.push(doc);
    }

    // Start with the first document as the base
    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;

    let mut dest_page_refs = get_page_references(&dest);
    for &page_id in &dest_page_refs {
        materialize_inherited(&mut dest, page_id);
    }

    for mut source in loaded_docs.into_iter() {
        let source_pages = get_page_references(&source);
        for &page_id in &source_pages {
            materialize_inherited(&mut source, page_id);
        }

        // Calculate offset for object IDs to avoid conflicts
        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped_objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.objects.extend(remapped_objects);

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|(num, generation)| (num + id_offset, generation)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    update_page_tree(&mut dest, dest_page_refs)?;

    // Catalogs and Pages nodes of the sources are unreachable now
    dest.prune_objects();
    dest.compress();

    document::save(&mut dest)
}

/// Get all page object references from a document, in page order
fn get_page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Copy attributes a page inherits from its ancestors onto the page itself,
/// so it can be re-parented without losing them.
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) {
    let inherited: Vec<(&[u8], Object)> = INHERITABLE_KEYS
        .iter()
        .filter_map(|key| {
            document::inherited_attribute(doc, page_id, key).map(|value| (*key, value))
        })
        .collect();

    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            if !page.has(key) {
                page.set(key.to_vec(), value);
            }
        }
    }
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination root `Pages` node at every page, in order
fn update_page_tree(doc: &mut Document, page_refs: Vec<ObjectId>) -> Result<()> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfToolError::OperationError("No Root in trailer".into()))?;

    let pages_id = doc
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PdfToolError::OperationError("No Pages in catalog".into()))?;

    for &page_id in &page_refs {
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    let pages_dict = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| PdfToolError::OperationError("Invalid pages dictionary".into()))?;

    let kids = page_refs
        .iter()
        .map(|&id| Object::Reference(id))
        .collect::<Vec<_>>();
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(page_refs.len() as i64));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::text_pdf;
    use lopdf::Document;

    fn texts(pdf: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .keys()
            .map(|n| doc.extract_text(&[*n]).unwrap())
            .collect()
    }

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(vec![]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("No documents to merge"));
    }

    #[test]
    fn test_merge_single_document_returns_same() {
        let pdf = text_pdf(2, "Single");
        let result = merge_documents(vec![pdf.clone()]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn test_merge_two_documents_combines_pages() {
        let doc_a = text_pdf(2, "DocA");
        let doc_b = text_pdf(3, "DocB");

        let merged = merge_documents(vec![doc_a, doc_b]).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 5, "Merged document should have 5 pages");
    }

    #[test]
    fn test_merge_preserves_page_order() {
        let doc1 = text_pdf(2, "First");
        let doc2 = text_pdf(1, "Second");
        let doc3 = text_pdf(2, "Third");

        let merged = merge_documents(vec![doc1, doc2, doc3]).unwrap();
        let texts = texts(&merged);

        let expected = [
            "First Page 1",
            "First Page 2",
            "Second Page 1",
            "Third Page 1",
            "Third Page 2",
        ];
        assert_eq!(texts.len(), expected.len());
        for (text, want) in texts.iter().zip(expected) {
            assert!(text.contains(want), "expected {:?} in {:?}", want, text);
        }
    }

    #[test]
    fn test_merged_pages_keep_inherited_attributes() {
        let merged = merge_documents(vec![text_pdf(1, "A"), text_pdf(1, "B")]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();

        let root_pages = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .and_then(|c| c.get(b"Pages"))
            .and_then(Object::as_reference)
            .unwrap();

        for page_id in doc.get_pages().values() {
            let page = doc.get_dictionary(*page_id).unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
            assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), root_pages);
        }
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        let doc1 = text_pdf(10, "Large");
        let doc2 = text_pdf(1, "Small");
        let doc3 = text_pdf(5, "Medium");

        let merged = merge_documents(vec![doc1, doc2, doc3]).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 16, "Merged document should have 16 pages");
    }

    #[test]
    fn test_merge_reports_which_document_is_broken() {
        let err = merge_documents(vec![text_pdf(1, "Ok"), b"garbage".to_vec()]).unwrap_err();
        assert!(err.to_string().contains("document 2"));
    }
}
