//! Signature and initials image payload handling.
//!
//! Field values for signature/initials arrive as base64-encoded PNG or JPEG
//! bytes, optionally wrapped in a `data:image/...;base64,` URI. They are
//! embedded as image XObjects with the alpha channel split into a soft mask
//! so transparent signature backgrounds stay transparent on the page.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::Result;
use crate::pdf;

/// RGBA image split into the RGB samples and alpha soft-mask lopdf needs.
pub(crate) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Vec<u8>,
}

/// Decode a base64 (optionally data-URI-prefixed) image payload.
///
/// Returns a plain error string: callers treat decode failures as non-fatal,
/// log them, and leave the field blank.
pub(crate) fn decode_image_payload(payload: &str) -> std::result::Result<DecodedImage, String> {
    let encoded = strip_data_uri(payload);
    let bytes = B64
        .decode(encoded.trim().as_bytes())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| format!("undecodable image: {e}"))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err("image has zero dimensions".into());
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in img.pixels() {
        rgb.push(pixel[0]);
        rgb.push(pixel[1]);
        rgb.push(pixel[2]);
        alpha.push(pixel[3]);
    }
    Ok(DecodedImage {
        width,
        height,
        rgb,
        alpha,
    })
}

/// Strip a `data:image/...;base64,` prefix when present.
fn strip_data_uri(payload: &str) -> &str {
    match payload.find(";base64,") {
        Some(idx) => &payload[idx + ";base64,".len()..],
        None => payload,
    }
}

/// Add the image (plus its alpha soft mask) as XObjects and register them
/// under `name` in the page's resources.
pub(crate) fn register_image_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    img: &DecodedImage,
) -> Result<()> {
    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img.width as i64,
            "Height" => img.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        img.alpha.clone(),
    ));
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img.width as i64,
            "Height" => img.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        img.rgb.clone(),
    ));

    let xobjects = pdf::ensure_resource_dict(doc, page_id, "XObject")?;
    xobjects.set(name, Object::Reference(image_id));
    Ok(())
}
