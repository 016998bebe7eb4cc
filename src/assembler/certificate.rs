//! Certificate page generation.
//!
//! The final document ends with one or more appended certificate pages
//! listing every signer in order with their completion metadata. Each signer
//! occupies a fixed-height block; a new page starts whenever the remaining
//! vertical space cannot fit another block.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::SignerData;
use crate::error::{Error, Result};
use crate::geometry::{US_LETTER_HEIGHT, US_LETTER_WIDTH};
use crate::pdf;

const MARGIN: f64 = 54.0;
const TITLE_SIZE: f64 = 18.0;
const BODY_SIZE: f64 = 10.0;
const LINE_LEADING: f64 = 14.0;
/// Vertical space reserved per signer entry (four lines plus padding).
const SIGNER_BLOCK_HEIGHT: f64 = 80.0;

/// Append certificate pages for the given signers.
pub(crate) fn append_certificate_pages(
    doc: &mut Document,
    signers: &[SignerData],
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let pages_root_id = pages_root(doc)?;

    let regular_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut new_page_ids = Vec::new();
    let mut page = CertificatePage::new(generated_at);
    for (index, signer) in signers.iter().enumerate() {
        if page.remaining() < SIGNER_BLOCK_HEIGHT {
            new_page_ids.push(page.finish(doc, pages_root_id, regular_font, bold_font));
            page = CertificatePage::new(generated_at);
        }
        page.push_signer_block(index, signer);
    }
    new_page_ids.push(page.finish(doc, pages_root_id, regular_font, bold_font));

    attach_pages(doc, pages_root_id, &new_page_ids)
}

/// One certificate page being laid out, cursor measured as a baseline
/// y-coordinate in bottom-left-origin page space.
struct CertificatePage {
    operations: Vec<Operation>,
    cursor: f64,
}

impl CertificatePage {
    fn new(generated_at: DateTime<Utc>) -> Self {
        let mut page = Self {
            operations: Vec::new(),
            cursor: US_LETTER_HEIGHT - MARGIN - TITLE_SIZE,
        };
        page.text_line(FontSlot::Bold, TITLE_SIZE, MARGIN, page.cursor, "Signing Certificate");
        page.cursor -= LINE_LEADING;
        let stamp = format!(
            "Generated {}",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        page.text_line(FontSlot::Regular, BODY_SIZE, MARGIN, page.cursor, &stamp);
        page.cursor -= 2.0 * LINE_LEADING;
        page
    }

    fn remaining(&self) -> f64 {
        self.cursor - MARGIN
    }

    fn push_signer_block(&mut self, index: usize, signer: &SignerData) {
        let heading = format!("Signer {}: {}", index + 1, signer.name);
        self.text_line(FontSlot::Bold, BODY_SIZE, MARGIN, self.cursor, &heading);
        self.cursor -= LINE_LEADING;

        let email = format!("Email: {}", signer.email);
        self.text_line(FontSlot::Regular, BODY_SIZE, MARGIN, self.cursor, &email);
        self.cursor -= LINE_LEADING;

        let signed = match signer.signed_at {
            Some(at) => format!("Signed at: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => "Signed at: not recorded".to_string(),
        };
        self.text_line(FontSlot::Regular, BODY_SIZE, MARGIN, self.cursor, &signed);
        self.cursor -= LINE_LEADING;

        if let Some(ip) = &signer.ip {
            let line = format!("IP address: {ip}");
            self.text_line(FontSlot::Regular, BODY_SIZE, MARGIN, self.cursor, &line);
        }
        // Fixed-height blocks: advance past the block regardless of how many
        // lines it actually used.
        self.cursor -= SIGNER_BLOCK_HEIGHT - 3.0 * LINE_LEADING;
    }

    fn text_line(&mut self, font: FontSlot, size: f64, x: f64, y: f64, text: &str) {
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new(
            "Tf",
            vec![font.name().into(), (size as f32).into()],
        ));
        self.operations.push(Operation::new(
            "Td",
            vec![(x as f32).into(), (y as f32).into()],
        ));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(pdf::escape_pdf_text(text))],
        ));
        self.operations.push(Operation::new("ET", vec![]));
    }

    fn finish(
        self,
        doc: &mut Document,
        pages_root_id: ObjectId,
        regular_font: ObjectId,
        bold_font: ObjectId,
    ) -> ObjectId {
        let content = Content {
            operations: self.operations,
        };
        let encoded = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_root_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (US_LETTER_WIDTH as f32).into(),
                (US_LETTER_HEIGHT as f32).into(),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "FCreg" => Object::Reference(regular_font),
                    "FCbold" => Object::Reference(bold_font),
                },
            },
            "Contents" => Object::Reference(content_id),
        })
    }
}

#[derive(Clone, Copy)]
enum FontSlot {
    Regular,
    Bold,
}

impl FontSlot {
    fn name(self) -> Object {
        match self {
            FontSlot::Regular => Object::Name(b"FCreg".to_vec()),
            FontSlot::Bold => Object::Name(b"FCbold".to_vec()),
        }
    }
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Pages").ok())
        .and_then(|pages| pages.as_reference().ok())
        .ok_or_else(|| Error::DocumentParse("document has no page tree".into()))
}

fn attach_pages(doc: &mut Document, pages_root_id: ObjectId, page_ids: &[ObjectId]) -> Result<()> {
    let pages_dict = doc
        .get_object_mut(pages_root_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| Error::DocumentParse(format!("page tree root missing: {e}")))?;

    let count = pages_dict
        .get(b"Count")
        .and_then(|c| c.as_i64())
        .unwrap_or(0);
    pages_dict.set("Count", count + page_ids.len() as i64);

    match pages_dict.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => {
            for page_id in page_ids {
                kids.push(Object::Reference(*page_id));
            }
        }
        _ => {
            let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
            pages_dict.set("Kids", Object::Array(kids));
        }
    }
    Ok(())
}
