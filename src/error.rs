//! Error types for the signing engine.
//!
//! This module defines all error types that can occur during marker detection,
//! envelope state transitions, and final document assembly.

/// Result type alias for signing engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during signing engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unreadable PDF. Fatal: aborts the calling operation.
    #[error("Failed to parse PDF document: {0}")]
    DocumentParse(String),

    /// Caller-correctable input problem (missing required field value,
    /// out-of-range signer index, mismatched field value kind).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An attempted state transition whose precondition is unmet.
    ///
    /// The message names the signer or field that blocked the transition.
    #[error("Transition rejected: {0}")]
    GuardViolation(String),

    /// Referenced envelope, signature, or document does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind ("envelope", "signature", "document", "blob")
        kind: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// Blob store or persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with a displayable id.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_violation_message_carries_reason() {
        let err = Error::GuardViolation("signer alice@example.com has not signed yet".into());
        let msg = format!("{}", err);
        assert!(msg.contains("Transition rejected"));
        assert!(msg.contains("alice@example.com"));
    }

    #[test]
    fn test_not_found_formats_kind_and_id() {
        let err = Error::not_found("envelope", "a1b2");
        assert_eq!(format!("{}", err), "envelope not found: a1b2");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
