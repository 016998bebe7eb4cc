//! Envelope, signature, and field entities.
//!
//! One [`Envelope`] is one signing request against exactly one document. The
//! envelope exclusively owns its [`Signature`]s (one per signer), each of
//! which exclusively owns its [`SignatureField`]s (one per required input).
//! The document is referenced by storage key, never owned.
//!
//! All state transitions are driven through the methods in [`state`]; nothing
//! outside this module mutates status fields directly.

pub mod state;

pub use state::SigningProgress;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detector::DetectedMarker;
use crate::fields::{FieldKind, FieldValue};
use crate::geometry::FieldRect;

/// An uploaded document: immutable byte content referenced by storage key.
///
/// Never mutated after upload; a new version is a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document id
    pub id: Uuid,
    /// Blob store key holding the original bytes
    pub storage_key: String,
    /// Declared page count
    pub page_count: u32,
    /// Mime type as uploaded
    pub mime_type: String,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

/// Signing-order policy for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningOrder {
    /// Signers complete strictly in `signing_order` index order.
    Sequential,
    /// Signers may complete in any order.
    Parallel,
}

/// Envelope lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// Created, not yet sent
    Draft,
    /// Sent to signers, none has acted yet
    Sent,
    /// At least one signer has viewed or signed
    InProgress,
    /// Every signer signed and the final document was assembled
    Completed,
    /// A signer declined; terminal, the envelope can never complete
    Declined,
    /// Voided by the sender; terminal
    Voided,
    /// Passed its expiry without completing; terminal
    Expired,
}

impl EnvelopeStatus {
    /// Whether no further transitions are permitted from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnvelopeStatus::Completed
                | EnvelopeStatus::Declined
                | EnvelopeStatus::Voided
                | EnvelopeStatus::Expired
        )
    }

    /// Snake-case name used in messages and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeStatus::Draft => "draft",
            EnvelopeStatus::Sent => "sent",
            EnvelopeStatus::InProgress => "in_progress",
            EnvelopeStatus::Completed => "completed",
            EnvelopeStatus::Declined => "declined",
            EnvelopeStatus::Voided => "voided",
            EnvelopeStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signer status within an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// Registered, not yet notified (sequential signers wait here)
    Pending,
    /// Notified, signing link outstanding
    Sent,
    /// Signer opened the signing link
    Viewed,
    /// Signer completed all required fields
    Signed,
    /// Signer declined with a reason
    Declined,
    /// Envelope expired before this signer signed
    Expired,
}

/// One required input on the document, scoped to one signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureField {
    /// Field id
    pub id: Uuid,
    /// What this field collects
    pub kind: FieldKind,
    /// 1-based page number
    pub page_number: u32,
    /// Top-left-origin position and size in points
    pub rect: FieldRect,
    /// Source marker text when the field came from detection
    pub marker_text: Option<String>,
    /// Whether a value is required before the signer can finish
    pub is_required: bool,
    /// When the value was supplied
    pub completed_at: Option<DateTime<Utc>>,
    /// The supplied value, if any
    pub value: Option<FieldValue>,
}

impl SignatureField {
    /// Create a field at an explicit position. Fields are required by default.
    pub fn new(kind: FieldKind, page_number: u32, rect: FieldRect) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            page_number,
            rect,
            marker_text: None,
            is_required: true,
            completed_at: None,
            value: None,
        }
    }

    /// Create a field from a detected marker, keeping the marker text.
    pub fn from_marker(marker: &DetectedMarker) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: marker.kind,
            page_number: marker.page_number,
            rect: FieldRect::new(marker.x, marker.y, marker.width, marker.height),
            marker_text: Some(marker.marker_text.clone()),
            is_required: true,
            completed_at: None,
            value: None,
        }
    }

    /// Mark the field optional.
    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }
}

/// One participant's record within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Signature id
    pub id: Uuid,
    /// Signer display name
    pub signer_name: String,
    /// Signer email address
    pub signer_email: String,
    /// 1-based position in the signing order
    pub signing_order: u32,
    /// Current status
    pub status: SignatureStatus,
    /// Identity provider tag recorded with the signature
    pub provider: Option<String>,
    /// When the signing request was dispatched to this signer
    pub sent_at: Option<DateTime<Utc>>,
    /// When the signer first opened the signing link
    pub viewed_at: Option<DateTime<Utc>>,
    /// When the signer finished signing
    pub signed_at: Option<DateTime<Utc>>,
    /// When the signer declined
    pub declined_at: Option<DateTime<Utc>>,
    /// Reason supplied on decline
    pub decline_reason: Option<String>,
    /// Signer IP captured at signing time
    pub signer_ip: Option<String>,
    /// Number of reminders dispatched to this signer
    pub reminder_count: u32,
    /// When the last reminder was dispatched
    pub last_reminder_at: Option<DateTime<Utc>>,
    /// Required inputs owned by this signer
    pub fields: Vec<SignatureField>,
}

impl Signature {
    /// Register a signer at the given 1-based order position.
    pub fn new(name: impl Into<String>, email: impl Into<String>, signing_order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            signer_name: name.into(),
            signer_email: email.into(),
            signing_order,
            status: SignatureStatus::Pending,
            provider: None,
            sent_at: None,
            viewed_at: None,
            signed_at: None,
            declined_at: None,
            decline_reason: None,
            signer_ip: None,
            reminder_count: 0,
            last_reminder_at: None,
            fields: Vec::new(),
        }
    }

    /// Required fields that still lack a value.
    pub fn missing_required_fields(&self) -> Vec<&SignatureField> {
        self.fields
            .iter()
            .filter(|f| f.is_required && f.value.is_none())
            .collect()
    }

    /// Whether this signer can still act (not signed, declined, or expired).
    pub fn is_outstanding(&self) -> bool {
        !matches!(
            self.status,
            SignatureStatus::Signed | SignatureStatus::Declined | SignatureStatus::Expired
        )
    }
}

/// Name and email pair returned by transitions that require a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerContact {
    /// Signature id of the signer
    pub signature_id: Uuid,
    /// Signer display name
    pub name: String,
    /// Signer email address
    pub email: String,
}

impl From<&Signature> for SignerContact {
    fn from(sig: &Signature) -> Self {
        Self {
            signature_id: sig.id,
            name: sig.signer_name.clone(),
            email: sig.signer_email.clone(),
        }
    }
}

/// Kinds of events recorded on an envelope's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Envelope created in draft
    EnvelopeCreated,
    /// Envelope sent to signers
    EnvelopeSent,
    /// A signer opened the signing link
    SignerViewed,
    /// A signer completed all required fields
    SignerSigned,
    /// A signer declined
    SignerDeclined,
    /// Envelope voided by the sender
    EnvelopeVoided,
    /// Envelope passed its expiry
    EnvelopeExpired,
    /// A reminder was dispatched
    ReminderSent,
    /// Final document assembled and stored
    EnvelopeCompleted,
}

/// One append-only audit trail entry.
///
/// The trail is evidence, not control flow: no transition reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred
    pub occurred_at: DateTime<Utc>,
    /// Email of the acting party, or `"system"` for time-driven events
    pub actor: String,
    /// What happened
    pub action: AuditAction,
    /// Free-form detail (decline reason, void reason, ...)
    pub detail: Option<String>,
    /// Acting party's IP when captured
    pub ip: Option<String>,
}

/// One signing request for one document, containing one or more signers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope id
    pub id: Uuid,
    /// The document being signed
    pub document_id: Uuid,
    /// Lifecycle status
    pub status: EnvelopeStatus,
    /// Signing-order policy
    pub signing_order: SigningOrder,
    /// Sender display name
    pub sender_name: String,
    /// Sender email address
    pub sender_email: String,
    /// Optional subject line for signing-request emails
    pub email_subject: Option<String>,
    /// Optional message body for signing-request emails
    pub email_message: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// When the envelope was sent
    pub sent_at: Option<DateTime<Utc>>,
    /// When every signer had signed and assembly finished
    pub completed_at: Option<DateTime<Utc>>,
    /// When a signer declined
    pub declined_at: Option<DateTime<Utc>>,
    /// When the sender voided the envelope
    pub voided_at: Option<DateTime<Utc>>,
    /// Hard expiry; the envelope expires lazily once past this instant
    pub expires_at: Option<DateTime<Utc>>,
    /// Reason supplied on void
    pub void_reason: Option<String>,
    /// Blob store key of the assembled final document.
    ///
    /// Invariant: set if and only if status is [`EnvelopeStatus::Completed`].
    pub final_document_key: Option<String>,
    /// Signers, exclusively owned by this envelope
    pub signatures: Vec<Signature>,
    /// Append-only audit trail
    pub audit_trail: Vec<AuditEvent>,
}

impl Envelope {
    /// Create a draft envelope for a document.
    pub fn new(
        document_id: Uuid,
        signing_order: SigningOrder,
        sender_name: impl Into<String>,
        sender_email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let sender_email = sender_email.into();
        let mut envelope = Self {
            id: Uuid::new_v4(),
            document_id,
            status: EnvelopeStatus::Draft,
            signing_order,
            sender_name: sender_name.into(),
            sender_email: sender_email.clone(),
            email_subject: None,
            email_message: None,
            created_at: now,
            sent_at: None,
            completed_at: None,
            declined_at: None,
            voided_at: None,
            expires_at: None,
            void_reason: None,
            final_document_key: None,
            signatures: Vec::new(),
            audit_trail: Vec::new(),
        };
        envelope.record_audit(now, sender_email, AuditAction::EnvelopeCreated, None, None);
        envelope
    }

    /// Whether every signature is signed.
    pub fn all_signed(&self) -> bool {
        !self.signatures.is_empty()
            && self
                .signatures
                .iter()
                .all(|s| s.status == SignatureStatus::Signed)
    }

    /// Whether the envelope is mid-signing (sent or in progress).
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            EnvelopeStatus::Sent | EnvelopeStatus::InProgress
        )
    }

    /// Look up a signature by id.
    pub fn signature(&self, signature_id: Uuid) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.id == signature_id)
    }

    pub(crate) fn signature_mut(&mut self, signature_id: Uuid) -> Option<&mut Signature> {
        self.signatures.iter_mut().find(|s| s.id == signature_id)
    }

    pub(crate) fn record_audit(
        &mut self,
        now: DateTime<Utc>,
        actor: impl Into<String>,
        action: AuditAction,
        detail: Option<String>,
        ip: Option<String>,
    ) {
        self.audit_trail.push(AuditEvent {
            occurred_at: now,
            actor: actor.into(),
            action,
            detail,
            ip,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_envelope_is_draft_with_creation_audit() {
        let now = Utc::now();
        let envelope = Envelope::new(
            Uuid::new_v4(),
            SigningOrder::Sequential,
            "Sender",
            "sender@example.com",
            now,
        );
        assert_eq!(envelope.status, EnvelopeStatus::Draft);
        assert!(envelope.final_document_key.is_none());
        assert_eq!(envelope.audit_trail.len(), 1);
        assert_eq!(envelope.audit_trail[0].action, AuditAction::EnvelopeCreated);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(EnvelopeStatus::Completed.is_terminal());
        assert!(EnvelopeStatus::Declined.is_terminal());
        assert!(EnvelopeStatus::Voided.is_terminal());
        assert!(EnvelopeStatus::Expired.is_terminal());
        assert!(!EnvelopeStatus::Draft.is_terminal());
        assert!(!EnvelopeStatus::Sent.is_terminal());
        assert!(!EnvelopeStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_missing_required_fields_ignores_optional() {
        let mut sig = Signature::new("A", "a@example.com", 1);
        sig.fields.push(SignatureField::new(
            FieldKind::Signature,
            1,
            FieldRect::new(50.0, 700.0, 200.0, 50.0),
        ));
        sig.fields.push(
            SignatureField::new(
                FieldKind::Text,
                1,
                FieldRect::new(50.0, 600.0, 200.0, 25.0),
            )
            .optional(),
        );
        assert_eq!(sig.missing_required_fields().len(), 1);
        assert_eq!(sig.missing_required_fields()[0].kind, FieldKind::Signature);
    }

    #[test]
    fn test_envelope_serde_round_trip() {
        let mut envelope = Envelope::new(
            Uuid::new_v4(),
            SigningOrder::Parallel,
            "Sender",
            "sender@example.com",
            Utc::now(),
        );
        let mut sig = Signature::new("A", "a@example.com", 1);
        sig.fields.push(SignatureField::new(
            FieldKind::Date,
            1,
            FieldRect::new(10.0, 20.0, 120.0, 25.0),
        ));
        envelope.signatures.push(sig);

        let json = serde_json::to_string(&envelope).expect("serializes");
        assert!(json.contains("\"draft\""));
        assert!(json.contains("\"parallel\""));
        let back: Envelope = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.id, envelope.id);
        assert_eq!(back.status, EnvelopeStatus::Draft);
        assert_eq!(back.signatures[0].fields[0].kind, FieldKind::Date);
    }

    #[test]
    fn test_field_from_marker_keeps_marker_text() {
        let marker = DetectedMarker {
            kind: FieldKind::Initials,
            marker_text: "[INITIAL_HERE_2]".into(),
            signer_index: 1,
            page_number: 3,
            x: 100.0,
            y: 200.0,
            width: 80.0,
            height: 40.0,
        };
        let field = SignatureField::from_marker(&marker);
        assert_eq!(field.kind, FieldKind::Initials);
        assert_eq!(field.page_number, 3);
        assert_eq!(field.marker_text.as_deref(), Some("[INITIAL_HERE_2]"));
        assert!(field.is_required);
    }
}
