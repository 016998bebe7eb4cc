//! Final document assembly.
//!
//! Embeds every signer's completed field values into the source PDF at their
//! stored coordinates, appends the certificate page(s), stamps document
//! metadata, and serializes the result. The assembler is a pure transform
//! over byte buffers: it holds no state and touches no storage.
//!
//! Field coordinates arrive top-left-origin (the storage convention) and are
//! converted to the PDF's native bottom-left origin here, at the drawing
//! boundary, via `pdf_y = page_height − y − height`.
//!
//! A field image that fails to decode is logged and skipped; the rest of
//! the document still assembles. An unparseable input PDF is fatal.

mod certificate;
mod image_payload;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::{Error, Result};
use crate::fields::FieldValue;
use crate::geometry::FieldRect;
use crate::pdf;

/// Font size used for date and text field values.
const FIELD_FONT_SIZE: f64 = 10.0;
/// Left inset for text drawn inside a field box.
const FIELD_TEXT_INSET: f64 = 5.0;
/// Average Helvetica glyph width as a fraction of the font size, used to
/// clip text to the field width.
const APPROX_GLYPH_WIDTH: f64 = 0.5;
/// Resource name for the field-text font injected into source pages.
const FIELD_FONT_NAME: &str = "FEsign";

/// One completed field ready for embedding.
#[derive(Debug, Clone)]
pub struct EmbedField {
    /// 1-based page number
    pub page_number: u32,
    /// Top-left-origin position and size in points
    pub rect: FieldRect,
    /// The concrete value to draw
    pub value: FieldValue,
}

/// One signer's completed data, as the assembler consumes it.
#[derive(Debug, Clone)]
pub struct SignerData {
    /// Signer display name
    pub name: String,
    /// Signer email address
    pub email: String,
    /// When the signer finished signing
    pub signed_at: Option<DateTime<Utc>>,
    /// Signer IP captured at signing time
    pub ip: Option<String>,
    /// Completed fields to embed
    pub fields: Vec<EmbedField>,
}

/// Assembly options.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Producer string stamped into the output document's metadata.
    pub producer: String,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            producer: format!("esign_engine {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Embed every signer's field values into the PDF and append the
/// certificate page(s).
///
/// Fields targeting a page outside the document are skipped with a warning
/// (they should have been validated at creation). Signature/initials images
/// that fail to decode are skipped non-fatally and the field stays blank;
/// this is a deliberate best-effort policy so one bad payload cannot sink an
/// otherwise complete document.
pub fn embed_fields(
    pdf_bytes: &[u8],
    signers: &[SignerData],
    options: &AssembleOptions,
) -> Result<Vec<u8>> {
    let mut doc = pdf::load_document(pdf_bytes)?;
    let pages = doc.get_pages();
    let mut image_counter = 0usize;
    let mut pages_with_field_font: HashSet<ObjectId> = HashSet::new();
    let mut field_font_id: Option<ObjectId> = None;

    for signer in signers {
        for field in &signer.fields {
            let page_id = match pages.get(&field.page_number) {
                Some(id) => *id,
                None => {
                    log::warn!(
                        "field for {} targets page {} but the document has {} page(s); skipping",
                        signer.email,
                        field.page_number,
                        pages.len()
                    );
                    continue;
                }
            };
            let page = pdf::page_size(&doc, page_id);
            let pdf_y = field.rect.pdf_y(page.height);

            match &field.value {
                FieldValue::Signature { image } | FieldValue::Initials { image } => {
                    let decoded = match image_payload::decode_image_payload(image) {
                        Ok(decoded) => decoded,
                        Err(reason) => {
                            log::warn!(
                                "leaving {} field blank for {}: {}",
                                field.value.kind(),
                                signer.email,
                                reason
                            );
                            continue;
                        }
                    };
                    image_counter += 1;
                    let name = format!("ImEsign{image_counter}");
                    image_payload::register_image_xobject(&mut doc, page_id, &name, &decoded)?;
                    let content = format!(
                        "q {} 0 0 {} {} {} cm /{} Do Q",
                        field.rect.width, field.rect.height, field.rect.x, pdf_y, name
                    );
                    append_content(&mut doc, page_id, content)?;
                }
                FieldValue::Date { text } | FieldValue::Text { text } => {
                    ensure_field_font(
                        &mut doc,
                        page_id,
                        &mut field_font_id,
                        &mut pages_with_field_font,
                    )?;
                    let content = field_text_content(text, &field.rect, pdf_y);
                    append_content(&mut doc, page_id, content)?;
                }
            }
        }
    }

    let now = Utc::now();
    certificate::append_certificate_pages(&mut doc, signers, now)?;
    stamp_metadata(&mut doc, &options.producer, now);

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::DocumentParse(format!("failed to serialize output PDF: {e}")))?;
    Ok(output)
}

/// Build the content drawing a date/text value: left-aligned with a small
/// inset, vertically centered in the field box, clipped to the field width
/// minus 10pt.
fn field_text_content(text: &str, rect: &FieldRect, pdf_y: f64) -> String {
    let max_width = (rect.width - 10.0).max(0.0);
    let max_chars = (max_width / (FIELD_FONT_SIZE * APPROX_GLYPH_WIDTH)) as usize;
    let clipped: String = text.chars().take(max_chars).collect();
    if clipped.len() < text.len() {
        log::debug!("clipped field text to {} character(s)", max_chars);
    }
    let baseline = pdf_y + (rect.height - FIELD_FONT_SIZE) / 2.0;
    format!(
        "BT /{} {} Tf {} {} Td ({}) Tj ET",
        FIELD_FONT_NAME,
        FIELD_FONT_SIZE,
        rect.x + FIELD_TEXT_INSET,
        baseline,
        pdf::escape_pdf_text(&clipped)
    )
}

/// Make sure the page carries the field-text font resource, creating the
/// shared font object on first use.
fn ensure_field_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: &mut Option<ObjectId>,
    done: &mut HashSet<ObjectId>,
) -> Result<()> {
    if done.contains(&page_id) {
        return Ok(());
    }
    let font_id = *font_id.get_or_insert_with(|| {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        })
    });
    let fonts = pdf::ensure_resource_dict(doc, page_id, "Font")?;
    if !fonts.has(FIELD_FONT_NAME.as_bytes()) {
        fonts.set(FIELD_FONT_NAME, Object::Reference(font_id));
    }
    done.insert(page_id);
    Ok(())
}

fn append_content(doc: &mut Document, page_id: ObjectId, content: String) -> Result<()> {
    pdf::append_page_content(doc, page_id, content.into_bytes())
}

/// Stamp producer and modification date into the document info dictionary.
fn stamp_metadata(doc: &mut Document, producer: &str, now: DateTime<Utc>) {
    let info_id = match doc.trailer.get(b"Info").and_then(|o| o.as_reference()) {
        Ok(id) => id,
        Err(_) => {
            let id = doc.add_object(Object::Dictionary(dictionary! {}));
            doc.trailer.set("Info", id);
            id
        }
    };
    if let Ok(info) = doc.get_object_mut(info_id).and_then(|o| o.as_dict_mut()) {
        info.set(
            "Producer",
            Object::String(producer.as_bytes().to_vec(), StringFormat::Literal),
        );
        info.set(
            "ModDate",
            Object::String(
                now.format("D:%Y%m%d%H%M%SZ").to_string().into_bytes(),
                StringFormat::Literal,
            ),
        );
    }
}
