//! Field kinds and field values.
//!
//! Every required input on a document is one of four kinds. Values are a
//! tagged union per kind (image payloads for signature and initials, literal
//! strings for date and text) so the embedder can match exhaustively.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The kind of input a signature field collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Full signature, captured as a raster image
    Signature,
    /// Initials, captured as a raster image
    Initials,
    /// Date string
    Date,
    /// Free text string
    Text,
}

impl FieldKind {
    /// Default field dimensions in points at 72 DPI: signature 200×50,
    /// initials 80×40, date 120×25, text 200×25.
    pub fn default_size(&self) -> (f64, f64) {
        match self {
            FieldKind::Signature => (200.0, 50.0),
            FieldKind::Initials => (80.0, 40.0),
            FieldKind::Date => (120.0, 25.0),
            FieldKind::Text => (200.0, 25.0),
        }
    }

    /// Lowercase name used in persisted records and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Signature => "signature",
            FieldKind::Initials => "initials",
            FieldKind::Date => "date",
            FieldKind::Text => "text",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed field's concrete value.
///
/// Image payloads are base64-encoded PNG or JPEG bytes, with or without a
/// `data:image/...;base64,` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldValue {
    /// Signature image payload
    Signature {
        /// Base64-encoded image bytes, data-URI prefix allowed
        image: String,
    },
    /// Initials image payload
    Initials {
        /// Base64-encoded image bytes, data-URI prefix allowed
        image: String,
    },
    /// Literal date string, drawn as-is
    Date {
        /// Date text
        text: String,
    },
    /// Literal free text, drawn as-is
    Text {
        /// Text content
        text: String,
    },
}

impl FieldValue {
    /// The field kind this value satisfies.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Signature { .. } => FieldKind::Signature,
            FieldValue::Initials { .. } => FieldKind::Initials,
            FieldValue::Date { .. } => FieldKind::Date,
            FieldValue::Text { .. } => FieldKind::Text,
        }
    }

    /// Reject a value whose kind does not match the field it is applied to.
    pub fn ensure_matches(&self, expected: FieldKind) -> Result<()> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "field expects a {} value, got {}",
                expected,
                self.kind()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizes() {
        assert_eq!(FieldKind::Signature.default_size(), (200.0, 50.0));
        assert_eq!(FieldKind::Initials.default_size(), (80.0, 40.0));
        assert_eq!(FieldKind::Date.default_size(), (120.0, 25.0));
        assert_eq!(FieldKind::Text.default_size(), (200.0, 25.0));
    }

    #[test]
    fn test_value_kind_mapping() {
        let value = FieldValue::Date {
            text: "2026-08-06".into(),
        };
        assert_eq!(value.kind(), FieldKind::Date);
        assert!(value.ensure_matches(FieldKind::Date).is_ok());
    }

    #[test]
    fn test_mismatched_value_is_rejected() {
        let value = FieldValue::Text {
            text: "hello".into(),
        };
        let err = value.ensure_matches(FieldKind::Signature).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(format!("{}", err).contains("signature"));
    }
}
