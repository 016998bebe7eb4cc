//! Internal lopdf helpers shared by the detector and the assembler.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::PageSize;

/// Parse PDF bytes into a [`Document`], mapping failures to
/// [`Error::DocumentParse`].
pub(crate) fn load_document(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| Error::DocumentParse(e.to_string()))
}

/// Page dimensions from the page's `MediaBox`, walking up the page tree via
/// `/Parent` when the box is inherited. Falls back to US Letter when no
/// geometry is recorded anywhere in the tree.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = match doc.get_object(id).and_then(|o| o.as_dict()) {
            Ok(dict) => dict,
            Err(_) => break,
        };
        if let Some(size) = media_box_size(doc, dict) {
            return size;
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    PageSize::us_letter()
}

fn media_box_size(doc: &Document, dict: &Dictionary) -> Option<PageSize> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = object_to_f64(&arr[0])?;
    let lly = object_to_f64(&arr[1])?;
    let urx = object_to_f64(&arr[2])?;
    let ury = object_to_f64(&arr[3])?;
    Some(PageSize::new(urx - llx, ury - lly))
}

/// Convert a lopdf numeric object (Integer or Real) to f64.
pub(crate) fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Get a mutable handle to the named sub-dictionary of a page's `Resources`,
/// creating the `Resources` entry and the sub-dictionary as needed.
///
/// An indirect `Resources` reference is followed; an indirect sub-dictionary
/// is replaced with a fresh inline one (the existing shared object may be
/// referenced by other pages and must not be mutated in place).
pub(crate) fn ensure_resource_dict<'a>(
    doc: &'a mut Document,
    page_id: ObjectId,
    key: &str,
) -> Result<&'a mut Dictionary> {
    let mut resources_obj = {
        let page_dict = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| Error::DocumentParse(format!("page dictionary missing: {e}")))?;
        page_dict
            .remove(b"Resources")
            .unwrap_or_else(|| Object::Dictionary(dictionary! {}))
    };

    // Follow an indirect Resources reference by materializing a copy inline.
    if let Object::Reference(id) = resources_obj {
        let resolved = doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|e| Error::DocumentParse(format!("resources dictionary missing: {e}")))?
            .clone();
        resources_obj = Object::Dictionary(resolved);
    }

    let mut resources = match resources_obj {
        Object::Dictionary(dict) => dict,
        _ => {
            return Err(Error::DocumentParse(
                "page resources is not a dictionary".into(),
            ))
        }
    };

    let sub = match resources.remove(key.as_bytes()) {
        Some(Object::Dictionary(dict)) => dict,
        _ => dictionary! {},
    };
    resources.set(key, Object::Dictionary(sub));

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| Error::DocumentParse(format!("page dictionary missing: {e}")))?;
    page_dict.set("Resources", Object::Dictionary(resources));

    match page_dict.get_mut(b"Resources") {
        Ok(Object::Dictionary(resources)) => match resources.get_mut(key.as_bytes()) {
            Ok(Object::Dictionary(sub)) => Ok(sub),
            _ => Err(Error::DocumentParse(format!(
                "page resources /{key} is not a dictionary"
            ))),
        },
        _ => Err(Error::DocumentParse(
            "page resources is not a dictionary".into(),
        )),
    }
}

/// Append a new content stream to a page, preserving existing content.
///
/// The page's `Contents` entry becomes an array of stream references; per
/// the PDF content model, multiple streams on one page are processed as one
/// concatenated stream.
pub(crate) fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<()> {
    let stream_id = doc.add_object(lopdf::Stream::new(dictionary! {}, content));
    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| Error::DocumentParse(format!("page dictionary missing: {e}")))?;

    let new_contents = match page_dict.remove(b"Contents") {
        Some(Object::Array(mut streams)) => {
            streams.push(Object::Reference(stream_id));
            Object::Array(streams)
        }
        Some(existing) => Object::Array(vec![existing, Object::Reference(stream_id)]),
        None => Object::Reference(stream_id),
    };
    page_dict.set("Contents", new_contents);
    Ok(())
}

/// Escape a string for use inside a PDF literal string `( ... )`.
pub(crate) fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}
