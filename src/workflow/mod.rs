//! Workflow orchestration.
//!
//! [`SigningService`] is the thin façade tying the pieces together: marker
//! detection on upload, envelope creation from detected or explicit field
//! placement, the send transition with its notifications, per-signer
//! completion cascading into final document assembly, and the decline / void
//! / expire paths.
//!
//! # Concurrency
//!
//! Every read-evaluate-transition-write sequence for one envelope runs under
//! that envelope's entry in a lock registry, so concurrent signer actions
//! cannot race the "all signed → completed" guard. No ordering is guaranteed
//! across different envelopes. Notification dispatch happens after the
//! transition is decided and is best-effort: a dispatch failure is logged
//! and never rolls the transition back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::assembler::{self, AssembleOptions, EmbedField, SignerData};
use crate::config::EngineConfig;
use crate::detector::{self, DetectedMarker};
use crate::envelope::{
    Envelope, SignatureField, SignerContact, Signature, SigningOrder, StoredDocument,
};
use crate::error::{Error, Result};
use crate::fields::{FieldKind, FieldValue};
use crate::geometry::FieldRect;
use crate::pdf;
use crate::store::{BlobStore, EnvelopeStore, NotificationDispatcher, NotificationTemplate};

/// One signer to register on a new envelope, in signing order.
#[derive(Debug, Clone)]
pub struct SignerSpec {
    /// Signer display name
    pub name: String,
    /// Signer email address
    pub email: String,
    /// Identity provider tag recorded on the signature
    pub provider: Option<String>,
}

impl SignerSpec {
    /// Create a signer spec.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            provider: None,
        }
    }

    /// Tag the signer with an identity provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// A field placed at caller-supplied coordinates.
#[derive(Debug, Clone)]
pub struct ExplicitField {
    /// 0-based index into the envelope's signer list
    pub signer_index: usize,
    /// What the field collects
    pub kind: FieldKind,
    /// 1-based page number
    pub page_number: u32,
    /// Top-left-origin position and size in points
    pub rect: FieldRect,
    /// Whether a value is required before the signer can finish
    pub is_required: bool,
}

/// Where a new envelope's fields come from.
#[derive(Debug, Clone)]
pub enum FieldPlacement {
    /// Fields derived from detected markers (signer index from the marker).
    DetectedMarkers(Vec<DetectedMarker>),
    /// Fields at caller-supplied explicit coordinates.
    Explicit(Vec<ExplicitField>),
}

/// Everything needed to create an envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeRequest {
    /// Document to sign
    pub document_id: Uuid,
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
    /// Optional hard expiry; falls back to the configured default
    pub expires_at: Option<DateTime<Utc>>,
    /// Signers in signing order
    pub signers: Vec<SignerSpec>,
    /// Field placement source
    pub placement: FieldPlacement,
}

/// The signing workflow façade.
///
/// Collaborators are injected once at construction; the service holds no
/// other state beyond the per-envelope lock registry.
pub struct SigningService {
    store: Arc<dyn EnvelopeStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: EngineConfig,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SigningService {
    /// Create a service with default configuration.
    pub fn new(
        store: Arc<dyn EnvelopeStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self::with_config(store, blobs, notifier, EngineConfig::default())
    }

    /// Create a service with explicit configuration.
    pub fn with_config(
        store: Arc<dyn EnvelopeStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            notifier,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store an uploaded PDF and optionally run marker detection on it.
    ///
    /// The bytes are parsed once to validate the document and count pages;
    /// a malformed PDF fails with [`Error::DocumentParse`] before anything
    /// is stored.
    pub fn upload_document(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        detect: bool,
    ) -> Result<(StoredDocument, Vec<DetectedMarker>)> {
        let parsed = pdf::load_document(&bytes)?;
        let page_count = parsed.get_pages().len() as u32;
        drop(parsed);

        let markers = if detect {
            detector::detect_markers(&bytes)?
        } else {
            Vec::new()
        };

        let storage_key = self.blobs.put(bytes)?;
        let document = StoredDocument {
            id: Uuid::new_v4(),
            storage_key,
            page_count,
            mime_type: mime_type.to_string(),
            uploaded_at: Utc::now(),
        };
        self.store.insert_document(document.clone())?;
        log::info!(
            "stored document {} ({} page(s), {} marker(s))",
            document.id,
            page_count,
            markers.len()
        );
        Ok((document, markers))
    }

    /// Re-run marker detection against a stored document.
    pub fn detect_document_markers(&self, document_id: Uuid) -> Result<Vec<DetectedMarker>> {
        let document = self.store.fetch_document(document_id)?;
        let bytes = self.blobs.get(&document.storage_key)?;
        detector::detect_markers(&bytes)
    }

    /// Create a draft envelope with its signatures and fields.
    ///
    /// Fields come either from detected markers or from explicit
    /// coordinates; a field addressing a signer index or page outside the
    /// envelope fails with [`Error::Validation`].
    pub fn create_envelope(&self, request: EnvelopeRequest) -> Result<Envelope> {
        let document = self.store.fetch_document(request.document_id)?;
        if request.signers.is_empty() {
            return Err(Error::Validation(
                "an envelope needs at least one signer".into(),
            ));
        }

        let now = Utc::now();
        let mut envelope = Envelope::new(
            request.document_id,
            request.signing_order,
            request.sender_name,
            request.sender_email,
            now,
        );
        envelope.email_subject = request.email_subject;
        envelope.email_message = request.email_message;
        envelope.expires_at = request.expires_at.or_else(|| {
            self.config
                .default_expiry_days
                .map(|days| now + Duration::days(days))
        });

        for (index, spec) in request.signers.iter().enumerate() {
            let mut signature =
                Signature::new(spec.name.clone(), spec.email.clone(), (index + 1) as u32);
            signature.provider = spec.provider.clone();
            envelope.signatures.push(signature);
        }

        match &request.placement {
            FieldPlacement::DetectedMarkers(markers) => {
                for marker in markers {
                    Self::ensure_field_target(
                        marker.signer_index,
                        marker.page_number,
                        request.signers.len(),
                        document.page_count,
                        &marker.marker_text,
                    )?;
                    envelope.signatures[marker.signer_index]
                        .fields
                        .push(SignatureField::from_marker(marker));
                }
            }
            FieldPlacement::Explicit(fields) => {
                for field in fields {
                    Self::ensure_field_target(
                        field.signer_index,
                        field.page_number,
                        request.signers.len(),
                        document.page_count,
                        field.kind.as_str(),
                    )?;
                    let mut built =
                        SignatureField::new(field.kind, field.page_number, field.rect);
                    built.is_required = field.is_required;
                    envelope.signatures[field.signer_index].fields.push(built);
                }
            }
        }

        self.store.insert_envelope(envelope.clone())?;
        log::info!(
            "created envelope {} with {} signer(s)",
            envelope.id,
            envelope.signatures.len()
        );
        Ok(envelope)
    }

    fn ensure_field_target(
        signer_index: usize,
        page_number: u32,
        signer_count: usize,
        page_count: u32,
        label: &str,
    ) -> Result<()> {
        if signer_index >= signer_count {
            return Err(Error::Validation(format!(
                "field {} addresses signer {} but the envelope has {} signer(s)",
                label,
                signer_index + 1,
                signer_count
            )));
        }
        if page_number == 0 || page_number > page_count {
            return Err(Error::Validation(format!(
                "field {} targets page {} but the document has {} page(s)",
                label, page_number, page_count
            )));
        }
        Ok(())
    }

    /// Send a draft envelope, notifying every currently-eligible signer.
    pub fn send_envelope(&self, envelope_id: Uuid) -> Result<Envelope> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        let recipients = envelope.send(Utc::now())?;
        self.store.update_envelope(&envelope)?;

        for recipient in &recipients {
            self.notify_signing_request(&envelope, recipient);
        }
        Ok(envelope)
    }

    /// Record a signer opening their signing link.
    pub fn record_signer_view(&self, envelope_id: Uuid, signature_id: Uuid) -> Result<Envelope> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        envelope.record_view(signature_id, Utc::now())?;
        self.store.update_envelope(&envelope)?;
        Ok(envelope)
    }

    /// Apply a signer's field values and complete their signature.
    ///
    /// When this is the last outstanding signer, the final document is
    /// assembled, stored, and recorded on the envelope before the call
    /// returns. The envelope's status is re-checked under the lock right
    /// before assembly, so a concurrent void cannot be overwritten.
    pub fn submit_signer_fields(
        &self,
        envelope_id: Uuid,
        signature_id: Uuid,
        values: Vec<(Uuid, FieldValue)>,
        signer_ip: Option<String>,
    ) -> Result<Envelope> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        let now = Utc::now();
        envelope.apply_field_values(signature_id, values, now)?;
        let progress = envelope.complete_signature(signature_id, signer_ip, now)?;
        // The signed transition is durable before assembly starts; an
        // assembly failure leaves an all-signed in-progress envelope that a
        // retry can finish.
        self.store.update_envelope(&envelope)?;

        let signer_email = envelope
            .signature(signature_id)
            .map(|s| s.signer_email.clone())
            .unwrap_or_default();
        self.notify(
            NotificationTemplate::DocumentSigned,
            &envelope.sender_email,
            [
                ("envelope_id".to_string(), envelope.id.to_string()),
                ("signer_email".to_string(), signer_email),
            ]
            .into(),
        );

        if let Some(next) = &progress.next_signer {
            self.notify_signing_request(&envelope, next);
        }

        if progress.ready_to_complete {
            // Do not start assembly if the envelope stopped being active; the
            // lock makes this check authoritative for the rest of the call.
            if envelope.is_active() && envelope.all_signed() {
                self.finalize_envelope(&mut envelope, now)?;
            }
        }

        self.store.update_envelope(&envelope)?;
        Ok(envelope)
    }

    /// Assemble the final document, store it, and complete the envelope.
    fn finalize_envelope(&self, envelope: &mut Envelope, now: DateTime<Utc>) -> Result<()> {
        let document = self.store.fetch_document(envelope.document_id)?;
        let source = self.blobs.get(&document.storage_key)?;

        let signers = signer_embed_data(envelope);
        let options = AssembleOptions {
            producer: self.config.producer.clone(),
        };
        let assembled = assembler::embed_fields(&source, &signers, &options)?;
        let final_key = self.blobs.put(assembled)?;
        envelope.mark_completed(final_key.clone(), now)?;

        self.notify(
            NotificationTemplate::EnvelopeCompleted,
            &envelope.sender_email,
            [
                ("envelope_id".to_string(), envelope.id.to_string()),
                ("final_document_key".to_string(), final_key),
            ]
            .into(),
        );
        Ok(())
    }

    /// Record a signer's decline. Terminal for the envelope.
    pub fn decline_signer(
        &self,
        envelope_id: Uuid,
        signature_id: Uuid,
        reason: &str,
        signer_ip: Option<String>,
    ) -> Result<Envelope> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        envelope.decline(signature_id, reason, signer_ip, Utc::now())?;
        self.store.update_envelope(&envelope)?;

        let signer_email = envelope
            .signature(signature_id)
            .map(|s| s.signer_email.clone())
            .unwrap_or_default();
        self.notify(
            NotificationTemplate::SignatureDeclined,
            &envelope.sender_email,
            [
                ("envelope_id".to_string(), envelope.id.to_string()),
                ("signer_email".to_string(), signer_email),
                ("reason".to_string(), reason.trim().to_string()),
            ]
            .into(),
        );
        Ok(envelope)
    }

    /// Void an envelope, notifying every signer who had not yet signed.
    pub fn void_envelope(&self, envelope_id: Uuid, reason: &str) -> Result<Envelope> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        let unsigned = envelope.void(reason, Utc::now())?;
        self.store.update_envelope(&envelope)?;

        for contact in &unsigned {
            self.notify(
                NotificationTemplate::EnvelopeVoided,
                &contact.email,
                [
                    ("envelope_id".to_string(), envelope.id.to_string()),
                    ("sender_name".to_string(), envelope.sender_name.clone()),
                    ("reason".to_string(), reason.to_string()),
                ]
                .into(),
            );
        }
        Ok(envelope)
    }

    /// Lazily expire an envelope past its deadline. Idempotent: returns
    /// `true` only when this call performed the transition.
    pub fn expire_if_past_due(&self, envelope_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        let expired = envelope.expire_if_past_due(now);
        if expired {
            self.store.update_envelope(&envelope)?;
        }
        Ok(expired)
    }

    /// Remind every signer currently eligible to sign. Returns how many
    /// signers were reminded; zero is valid.
    pub fn send_reminders(&self, envelope_id: Uuid) -> Result<usize> {
        let lock = self.envelope_lock(envelope_id);
        let _guard = lock.lock().expect("envelope lock poisoned");

        let mut envelope = self.store.fetch_envelope(envelope_id)?;
        let reminded = envelope.remind(Utc::now());
        if !reminded.is_empty() {
            self.store.update_envelope(&envelope)?;
        }
        for contact in &reminded {
            self.notify(
                NotificationTemplate::SignatureReminder,
                &contact.email,
                [
                    ("envelope_id".to_string(), envelope.id.to_string()),
                    ("sender_name".to_string(), envelope.sender_name.clone()),
                    ("signer_name".to_string(), contact.name.clone()),
                ]
                .into(),
            );
        }
        Ok(reminded.len())
    }

    /// Fetch an envelope's current state.
    pub fn envelope(&self, envelope_id: Uuid) -> Result<Envelope> {
        self.store.fetch_envelope(envelope_id)
    }

    fn notify_signing_request(&self, envelope: &Envelope, recipient: &SignerContact) {
        let mut variables: HashMap<String, String> = [
            ("envelope_id".to_string(), envelope.id.to_string()),
            ("sender_name".to_string(), envelope.sender_name.clone()),
            ("signer_name".to_string(), recipient.name.clone()),
            (
                "signature_id".to_string(),
                recipient.signature_id.to_string(),
            ),
        ]
        .into();
        if let Some(subject) = &envelope.email_subject {
            variables.insert("subject".to_string(), subject.clone());
        }
        if let Some(message) = &envelope.email_message {
            variables.insert("message".to_string(), message.clone());
        }
        self.notify(
            NotificationTemplate::SignatureRequest,
            &recipient.email,
            variables,
        );
    }

    /// Best-effort dispatch: failures are logged, never propagated.
    fn notify(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        variables: HashMap<String, String>,
    ) {
        if let Err(e) = self.notifier.dispatch(template, recipient, variables) {
            log::warn!("failed to dispatch {template} to {recipient}: {e}");
        }
    }

    fn envelope_lock(&self, envelope_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(envelope_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Flatten an envelope's signatures into the assembler's input, in signing
/// order. Fields without values (optional, unfilled) are left out.
fn signer_embed_data(envelope: &Envelope) -> Vec<SignerData> {
    let mut signatures: Vec<&Signature> = envelope.signatures.iter().collect();
    signatures.sort_by_key(|s| s.signing_order);
    signatures
        .into_iter()
        .map(|sig| SignerData {
            name: sig.signer_name.clone(),
            email: sig.signer_email.clone(),
            signed_at: sig.signed_at,
            ip: sig.signer_ip.clone(),
            fields: sig
                .fields
                .iter()
                .filter_map(|f| {
                    f.value.clone().map(|value| EmbedField {
                        page_number: f.page_number,
                        rect: f.rect,
                        value,
                    })
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_embed_data_orders_by_signing_order_and_skips_empty() {
        let now = Utc::now();
        let mut envelope = Envelope::new(
            Uuid::new_v4(),
            SigningOrder::Sequential,
            "S",
            "s@example.com",
            now,
        );
        let mut second = Signature::new("B", "b@example.com", 2);
        let mut field = SignatureField::new(
            FieldKind::Date,
            1,
            FieldRect::new(0.0, 0.0, 120.0, 25.0),
        );
        field.value = Some(FieldValue::Date {
            text: "2026-08-06".into(),
        });
        second.fields.push(field);
        second.fields.push(SignatureField::new(
            FieldKind::Text,
            1,
            FieldRect::new(0.0, 40.0, 200.0, 25.0),
        ));
        let first = Signature::new("A", "a@example.com", 1);
        // Insert out of order on purpose.
        envelope.signatures.push(second);
        envelope.signatures.push(first);

        let data = signer_embed_data(&envelope);
        assert_eq!(data[0].email, "a@example.com");
        assert_eq!(data[1].email, "b@example.com");
        // Only the valued field survives.
        assert_eq!(data[1].fields.len(), 1);
    }
}
