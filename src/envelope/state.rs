//! Envelope state transitions.
//!
//! Every lifecycle change flows through the methods here:
//!
//! ```text
//! draft → sent → in_progress → completed
//!           \        |    \
//!            \       |     declined (signer declined; terminal)
//!             voided / expired (terminal, from any non-terminal state)
//! ```
//!
//! Transitions validate their guards and return [`GuardViolation`] with the
//! specific signer or field that blocked them. The methods mutate only the
//! in-memory envelope; persistence, locking, and notification dispatch belong
//! to the workflow layer. The one exception to "status follows the method" is
//! completion: the last signer's transition reports readiness, and the caller
//! assembles the final document before invoking [`Envelope::mark_completed`],
//! so `final_document_key` is set if and only if the envelope is completed.
//!
//! [`GuardViolation`]: crate::Error::GuardViolation

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AuditAction, Envelope, EnvelopeStatus, SignatureStatus, SignerContact, SigningOrder,
};
use crate::error::{Error, Result};
use crate::fields::FieldValue;

/// Outcome of one signer completing their signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProgress {
    /// Every signature is now signed; the caller should assemble the final
    /// document and then call [`Envelope::mark_completed`].
    pub ready_to_complete: bool,
    /// For sequential envelopes, the signer unblocked by this completion;
    /// the caller dispatches their signing request.
    pub next_signer: Option<SignerContact>,
}

impl Envelope {
    /// Transition `draft → sent`.
    ///
    /// Marks the envelope sent and returns the signers to notify now: all of
    /// them for `parallel` envelopes, only the front of the order for
    /// `sequential` ones (later signers stay `pending` until their
    /// predecessor signs).
    pub fn send(&mut self, now: DateTime<Utc>) -> Result<Vec<SignerContact>> {
        if self.status != EnvelopeStatus::Draft {
            return Err(Error::GuardViolation(format!(
                "envelope {} is {}, only draft envelopes can be sent",
                self.id, self.status
            )));
        }
        if self.signatures.is_empty() {
            return Err(Error::GuardViolation(format!(
                "envelope {} has no signers",
                self.id
            )));
        }

        self.status = EnvelopeStatus::Sent;
        self.sent_at = Some(now);

        let recipients: Vec<SignerContact> = match self.signing_order {
            SigningOrder::Parallel => {
                for sig in &mut self.signatures {
                    sig.status = SignatureStatus::Sent;
                    sig.sent_at = Some(now);
                }
                self.signatures.iter().map(SignerContact::from).collect()
            }
            SigningOrder::Sequential => {
                let front_order = self
                    .signatures
                    .iter()
                    .map(|s| s.signing_order)
                    .min()
                    .expect("at least one signature");
                let mut recipients = Vec::new();
                for sig in &mut self.signatures {
                    if sig.signing_order == front_order {
                        sig.status = SignatureStatus::Sent;
                        sig.sent_at = Some(now);
                        recipients.push(SignerContact::from(&*sig));
                    }
                }
                recipients
            }
        };

        let sender = self.sender_email.clone();
        self.record_audit(now, sender, AuditAction::EnvelopeSent, None, None);
        Ok(recipients)
    }

    /// Per-signature `sent → viewed`, triggered by the signer opening the
    /// signing link. Moves the envelope to `in_progress`. Repeated views are
    /// a no-op.
    pub fn record_view(&mut self, signature_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.ensure_active("record a view")?;
        let sig = self
            .signature_mut(signature_id)
            .ok_or_else(|| Error::not_found("signature", signature_id))?;
        match sig.status {
            SignatureStatus::Viewed => return Ok(()),
            SignatureStatus::Sent => {}
            SignatureStatus::Pending => {
                return Err(Error::GuardViolation(format!(
                    "signer {} has not been sent the envelope yet",
                    sig.signer_email
                )));
            }
            other => {
                return Err(Error::GuardViolation(format!(
                    "signer {} is already {:?}",
                    sig.signer_email, other
                )));
            }
        }
        sig.status = SignatureStatus::Viewed;
        sig.viewed_at = Some(now);
        let actor = sig.signer_email.clone();
        self.status = EnvelopeStatus::InProgress;
        self.record_audit(now, actor, AuditAction::SignerViewed, None, None);
        Ok(())
    }

    /// Store field values supplied by a signer.
    ///
    /// Each value must match its field's kind; a mismatch or an unknown field
    /// id fails the whole call without applying anything.
    pub fn apply_field_values(
        &mut self,
        signature_id: Uuid,
        values: Vec<(Uuid, FieldValue)>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active("apply field values")?;
        let sig = self
            .signature_mut(signature_id)
            .ok_or_else(|| Error::not_found("signature", signature_id))?;
        if !sig.is_outstanding() {
            return Err(Error::GuardViolation(format!(
                "signer {} is {:?} and can no longer edit fields",
                sig.signer_email, sig.status
            )));
        }

        // Validate everything before mutating anything.
        for (field_id, value) in &values {
            let field = sig
                .fields
                .iter()
                .find(|f| f.id == *field_id)
                .ok_or_else(|| Error::not_found("field", field_id))?;
            value.ensure_matches(field.kind)?;
        }
        for (field_id, value) in values {
            let field = sig
                .fields
                .iter_mut()
                .find(|f| f.id == field_id)
                .expect("field id validated above");
            field.value = Some(value);
            field.completed_at = Some(now);
        }
        Ok(())
    }

    /// Per-signature `sent|viewed → signed`.
    ///
    /// Guards: the envelope is mid-signing, every required field on the
    /// signature carries a value, and (for sequential envelopes) every
    /// lower-order signer has already signed. On success the signature
    /// records `signed_at` and the signer IP, and the next sequential signer
    /// (if any) is unblocked and returned for notification.
    pub fn complete_signature(
        &mut self,
        signature_id: Uuid,
        signer_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SigningProgress> {
        self.ensure_active("complete a signature")?;
        let sig = self
            .signature(signature_id)
            .ok_or_else(|| Error::not_found("signature", signature_id))?;

        match sig.status {
            SignatureStatus::Sent | SignatureStatus::Viewed | SignatureStatus::Pending => {}
            SignatureStatus::Signed => {
                return Err(Error::GuardViolation(format!(
                    "signer {} has already signed",
                    sig.signer_email
                )));
            }
            other => {
                return Err(Error::GuardViolation(format!(
                    "signer {} is {:?} and cannot sign",
                    sig.signer_email, other
                )));
            }
        }

        if self.signing_order == SigningOrder::Sequential {
            if let Some(blocker) = self
                .signatures
                .iter()
                .filter(|s| {
                    s.signing_order < sig.signing_order && s.status != SignatureStatus::Signed
                })
                .min_by_key(|s| s.signing_order)
            {
                return Err(Error::GuardViolation(format!(
                    "sequential order: signer {} (order {}) must sign before {}",
                    blocker.signer_email, blocker.signing_order, sig.signer_email
                )));
            }
        } else if sig.status == SignatureStatus::Pending {
            return Err(Error::GuardViolation(format!(
                "signer {} has not been sent the envelope yet",
                sig.signer_email
            )));
        }

        let missing = sig.missing_required_fields();
        if !missing.is_empty() {
            let described: Vec<String> = missing
                .iter()
                .map(|f| format!("{} (page {})", f.kind, f.page_number))
                .collect();
            return Err(Error::Validation(format!(
                "signer {} has {} required field(s) without a value: {}",
                sig.signer_email,
                described.len(),
                described.join(", ")
            )));
        }

        let signer_order = sig.signing_order;
        let actor = sig.signer_email.clone();
        let sig = self
            .signature_mut(signature_id)
            .expect("signature id resolved above");
        sig.status = SignatureStatus::Signed;
        sig.signed_at = Some(now);
        sig.signer_ip = signer_ip.clone();

        self.status = EnvelopeStatus::InProgress;
        self.record_audit(now, actor, AuditAction::SignerSigned, None, signer_ip);

        // Unblock the next sequential signer.
        let next_signer = if self.signing_order == SigningOrder::Sequential {
            let next = self
                .signatures
                .iter_mut()
                .filter(|s| {
                    s.status == SignatureStatus::Pending && s.signing_order > signer_order
                })
                .min_by_key(|s| s.signing_order);
            next.map(|sig| {
                sig.status = SignatureStatus::Sent;
                sig.sent_at = Some(now);
                SignerContact::from(&*sig)
            })
        } else {
            None
        };

        Ok(SigningProgress {
            ready_to_complete: self.all_signed(),
            next_signer,
        })
    }

    /// Transition `in_progress → completed` after the final document has
    /// been assembled and stored under `final_document_key`.
    pub fn mark_completed(
        &mut self,
        final_document_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_active() {
            return Err(Error::GuardViolation(format!(
                "envelope {} is {} and cannot complete",
                self.id, self.status
            )));
        }
        if let Some(unsigned) = self
            .signatures
            .iter()
            .find(|s| s.status != SignatureStatus::Signed)
        {
            return Err(Error::GuardViolation(format!(
                "signer {} has not signed yet",
                unsigned.signer_email
            )));
        }
        self.status = EnvelopeStatus::Completed;
        self.completed_at = Some(now);
        self.final_document_key = Some(final_document_key.into());
        let sender = self.sender_email.clone();
        self.record_audit(now, sender, AuditAction::EnvelopeCompleted, None, None);
        Ok(())
    }

    /// Per-signature decline with a reason. Irrevocable: the envelope
    /// transitions to the terminal `declined` status and can never complete.
    pub fn decline(
        &mut self,
        signature_id: Uuid,
        reason: &str,
        signer_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::Validation("a decline reason is required".into()));
        }
        self.ensure_active("decline")?;
        let sig = self
            .signature_mut(signature_id)
            .ok_or_else(|| Error::not_found("signature", signature_id))?;
        match sig.status {
            SignatureStatus::Signed => {
                return Err(Error::GuardViolation(format!(
                    "signer {} has already signed and cannot decline",
                    sig.signer_email
                )));
            }
            SignatureStatus::Declined => {
                return Err(Error::GuardViolation(format!(
                    "signer {} has already declined",
                    sig.signer_email
                )));
            }
            _ => {}
        }
        sig.status = SignatureStatus::Declined;
        sig.declined_at = Some(now);
        sig.decline_reason = Some(reason.to_string());
        let actor = sig.signer_email.clone();

        self.status = EnvelopeStatus::Declined;
        self.declined_at = Some(now);
        self.record_audit(
            now,
            actor,
            AuditAction::SignerDeclined,
            Some(reason.to_string()),
            signer_ip,
        );
        Ok(())
    }

    /// Explicit void by the sender. Terminal. Returns the signers who had
    /// not yet signed, for notification.
    pub fn void(&mut self, reason: &str, now: DateTime<Utc>) -> Result<Vec<SignerContact>> {
        match self.status {
            EnvelopeStatus::Draft | EnvelopeStatus::Sent | EnvelopeStatus::InProgress => {}
            other => {
                return Err(Error::GuardViolation(format!(
                    "cannot void a {} envelope",
                    other
                )));
            }
        }
        self.status = EnvelopeStatus::Voided;
        self.voided_at = Some(now);
        self.void_reason = Some(reason.to_string());

        let unsigned: Vec<SignerContact> = self
            .signatures
            .iter()
            .filter(|s| s.status != SignatureStatus::Signed)
            .map(SignerContact::from)
            .collect();

        let sender = self.sender_email.clone();
        self.record_audit(
            now,
            sender,
            AuditAction::EnvelopeVoided,
            Some(reason.to_string()),
            None,
        );
        Ok(unsigned)
    }

    /// Lazily expire the envelope when `now` is past `expires_at`.
    ///
    /// Returns `true` only when this call performed the transition, so a
    /// second invocation on an already-expired envelope is a no-op.
    pub fn expire_if_past_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        let past_due = match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        };
        if !past_due {
            return false;
        }
        self.status = EnvelopeStatus::Expired;
        for sig in &mut self.signatures {
            if sig.is_outstanding() {
                sig.status = SignatureStatus::Expired;
            }
        }
        self.record_audit(now, "system", AuditAction::EnvelopeExpired, None, None);
        true
    }

    /// Dispatch-side bookkeeping for reminders.
    ///
    /// Every signer currently eligible to sign (outstanding, and at the
    /// front of the order for sequential envelopes) gets its reminder count
    /// incremented and is returned for notification. An empty result is
    /// valid, not an error.
    pub fn remind(&mut self, now: DateTime<Utc>) -> Vec<SignerContact> {
        if !self.is_active() {
            return Vec::new();
        }
        let front_order = match self.signing_order {
            SigningOrder::Sequential => self
                .signatures
                .iter()
                .filter(|s| s.is_outstanding())
                .map(|s| s.signing_order)
                .min(),
            SigningOrder::Parallel => None,
        };
        let mut reminded = Vec::new();
        for sig in &mut self.signatures {
            if !sig.is_outstanding() {
                continue;
            }
            if let Some(front) = front_order {
                if sig.signing_order != front {
                    continue;
                }
            }
            sig.reminder_count += 1;
            sig.last_reminder_at = Some(now);
            reminded.push(SignerContact::from(&*sig));
        }
        if !reminded.is_empty() {
            let detail = format!("{} signer(s) reminded", reminded.len());
            let sender = self.sender_email.clone();
            self.record_audit(now, sender, AuditAction::ReminderSent, Some(detail), None);
        }
        reminded
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::GuardViolation(format!(
                "cannot {} on a {} envelope",
                operation, self.status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Signature, SignatureField};
    use crate::fields::FieldKind;
    use crate::geometry::FieldRect;
    use chrono::Duration;

    fn signature_field() -> SignatureField {
        SignatureField::new(
            FieldKind::Signature,
            1,
            FieldRect::new(50.0, 700.0, 200.0, 50.0),
        )
    }

    fn two_signer_envelope(order: SigningOrder) -> Envelope {
        let now = Utc::now();
        let mut envelope = Envelope::new(
            Uuid::new_v4(),
            order,
            "Sender",
            "sender@example.com",
            now,
        );
        for (i, email) in ["a@example.com", "b@example.com"].iter().enumerate() {
            let mut sig = Signature::new(format!("Signer {}", i + 1), *email, (i + 1) as u32);
            sig.fields.push(signature_field());
            envelope.signatures.push(sig);
        }
        envelope
    }

    fn fill_fields(envelope: &mut Envelope, signature_id: Uuid) {
        let field_values: Vec<(Uuid, FieldValue)> = envelope
            .signature(signature_id)
            .unwrap()
            .fields
            .iter()
            .map(|f| {
                (
                    f.id,
                    FieldValue::Signature {
                        image: "iVBORw0KGgo=".into(),
                    },
                )
            })
            .collect();
        envelope
            .apply_field_values(signature_id, field_values, Utc::now())
            .unwrap();
    }

    #[test]
    fn test_send_sequential_notifies_only_first_signer() {
        let mut envelope = two_signer_envelope(SigningOrder::Sequential);
        let recipients = envelope.send(Utc::now()).unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].email, "a@example.com");
        assert_eq!(envelope.status, EnvelopeStatus::Sent);
        assert_eq!(envelope.signatures[0].status, SignatureStatus::Sent);
        assert_eq!(envelope.signatures[1].status, SignatureStatus::Pending);
    }

    #[test]
    fn test_send_parallel_notifies_everyone() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        let recipients = envelope.send(Utc::now()).unwrap();
        assert_eq!(recipients.len(), 2);
        assert!(envelope
            .signatures
            .iter()
            .all(|s| s.status == SignatureStatus::Sent));
    }

    #[test]
    fn test_send_twice_is_rejected() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let err = envelope.send(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::GuardViolation(_)));
    }

    #[test]
    fn test_send_without_signers_is_rejected() {
        let mut envelope = Envelope::new(
            Uuid::new_v4(),
            SigningOrder::Parallel,
            "Sender",
            "sender@example.com",
            Utc::now(),
        );
        assert!(matches!(
            envelope.send(Utc::now()),
            Err(Error::GuardViolation(_))
        ));
    }

    #[test]
    fn test_view_moves_envelope_in_progress() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let sig_id = envelope.signatures[0].id;
        envelope.record_view(sig_id, Utc::now()).unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::InProgress);
        assert_eq!(envelope.signatures[0].status, SignatureStatus::Viewed);
        // Second view is a no-op.
        envelope.record_view(sig_id, Utc::now()).unwrap();
    }

    #[test]
    fn test_sequential_out_of_order_signing_is_blocked() {
        let mut envelope = two_signer_envelope(SigningOrder::Sequential);
        envelope.send(Utc::now()).unwrap();
        let second = envelope.signatures[1].id;
        fill_fields(&mut envelope, second);
        let err = envelope
            .complete_signature(second, None, Utc::now())
            .unwrap_err();
        match err {
            Error::GuardViolation(msg) => {
                assert!(msg.contains("a@example.com"), "should name the blocker: {msg}");
            }
            other => panic!("expected guard violation, got {other:?}"),
        }
    }

    #[test]
    fn test_sequential_happy_path_unblocks_next_and_completes() {
        let mut envelope = two_signer_envelope(SigningOrder::Sequential);
        envelope.send(Utc::now()).unwrap();
        let first = envelope.signatures[0].id;
        let second = envelope.signatures[1].id;

        fill_fields(&mut envelope, first);
        let progress = envelope
            .complete_signature(first, Some("10.0.0.1".into()), Utc::now())
            .unwrap();
        assert!(!progress.ready_to_complete);
        let next = progress.next_signer.expect("second signer unblocked");
        assert_eq!(next.email, "b@example.com");
        assert_eq!(envelope.signatures[1].status, SignatureStatus::Sent);
        assert_eq!(envelope.status, EnvelopeStatus::InProgress);
        assert_eq!(
            envelope.signatures[0].signer_ip.as_deref(),
            Some("10.0.0.1")
        );

        fill_fields(&mut envelope, second);
        let progress = envelope
            .complete_signature(second, None, Utc::now())
            .unwrap();
        assert!(progress.ready_to_complete);
        assert!(progress.next_signer.is_none());

        envelope.mark_completed("blob-final", Utc::now()).unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Completed);
        assert_eq!(envelope.final_document_key.as_deref(), Some("blob-final"));
        assert!(envelope.completed_at.is_some());
    }

    #[test]
    fn test_parallel_signers_complete_in_either_order() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let first = envelope.signatures[0].id;
        let second = envelope.signatures[1].id;

        // Reverse order is fine for parallel envelopes.
        fill_fields(&mut envelope, second);
        let progress = envelope
            .complete_signature(second, None, Utc::now())
            .unwrap();
        assert!(!progress.ready_to_complete, "one signer is still outstanding");

        fill_fields(&mut envelope, first);
        let progress = envelope
            .complete_signature(first, None, Utc::now())
            .unwrap();
        assert!(progress.ready_to_complete);
    }

    #[test]
    fn test_missing_required_field_blocks_signing() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let first = envelope.signatures[0].id;
        let err = envelope
            .complete_signature(first, None, Utc::now())
            .unwrap_err();
        match err {
            Error::Validation(msg) => {
                assert!(msg.contains("a@example.com"));
                assert!(msg.contains("signature (page 1)"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_field_value_kind_mismatch_is_rejected() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let sig_id = envelope.signatures[0].id;
        let field_id = envelope.signature(sig_id).unwrap().fields[0].id;
        let err = envelope
            .apply_field_values(
                sig_id,
                vec![(field_id, FieldValue::Text { text: "nope".into() })],
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_decline_requires_reason_and_is_terminal() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let first = envelope.signatures[0].id;
        let second = envelope.signatures[1].id;

        assert!(matches!(
            envelope.decline(first, "  ", None, Utc::now()),
            Err(Error::Validation(_))
        ));

        envelope
            .decline(first, "wrong terms", None, Utc::now())
            .unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Declined);
        assert_eq!(
            envelope.signatures[0].decline_reason.as_deref(),
            Some("wrong terms")
        );

        // The other signer can no longer sign, and completion is impossible.
        fill_fields(&mut envelope, second);
        assert!(matches!(
            envelope.complete_signature(second, None, Utc::now()),
            Err(Error::GuardViolation(_))
        ));
        assert!(matches!(
            envelope.mark_completed("blob-x", Utc::now()),
            Err(Error::GuardViolation(_))
        ));
        assert!(envelope.final_document_key.is_none());
    }

    #[test]
    fn test_void_returns_unsigned_signers() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let first = envelope.signatures[0].id;
        fill_fields(&mut envelope, first);
        envelope.complete_signature(first, None, Utc::now()).unwrap();

        let notified = envelope.void("deal fell through", Utc::now()).unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Voided);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].email, "b@example.com");

        // Terminal: no further transitions.
        assert!(matches!(
            envelope.void("again", Utc::now()),
            Err(Error::GuardViolation(_))
        ));
    }

    #[test]
    fn test_expire_if_past_due_is_idempotent() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        let now = Utc::now();
        envelope.expires_at = Some(now - Duration::hours(1));
        envelope.send(now - Duration::hours(2)).unwrap();

        assert!(envelope.expire_if_past_due(now));
        assert_eq!(envelope.status, EnvelopeStatus::Expired);
        assert!(envelope
            .signatures
            .iter()
            .all(|s| s.status == SignatureStatus::Expired));
        let audit_len = envelope.audit_trail.len();

        // Second sweep: no-op, no duplicate audit entry.
        assert!(!envelope.expire_if_past_due(now));
        assert_eq!(envelope.status, EnvelopeStatus::Expired);
        assert_eq!(envelope.audit_trail.len(), audit_len);
    }

    #[test]
    fn test_expire_before_deadline_is_noop() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        let now = Utc::now();
        envelope.expires_at = Some(now + Duration::days(7));
        envelope.send(now).unwrap();
        assert!(!envelope.expire_if_past_due(now));
        assert_eq!(envelope.status, EnvelopeStatus::Sent);
    }

    #[test]
    fn test_remind_sequential_targets_front_of_order_only() {
        let mut envelope = two_signer_envelope(SigningOrder::Sequential);
        envelope.send(Utc::now()).unwrap();
        let reminded = envelope.remind(Utc::now());
        assert_eq!(reminded.len(), 1);
        assert_eq!(reminded[0].email, "a@example.com");
        assert_eq!(envelope.signatures[0].reminder_count, 1);
        assert_eq!(envelope.signatures[1].reminder_count, 0);

        // After the first signer signs, reminders move to the second.
        let first = envelope.signatures[0].id;
        fill_fields(&mut envelope, first);
        envelope.complete_signature(first, None, Utc::now()).unwrap();
        let reminded = envelope.remind(Utc::now());
        assert_eq!(reminded.len(), 1);
        assert_eq!(reminded[0].email, "b@example.com");
    }

    #[test]
    fn test_remind_parallel_targets_all_outstanding() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        assert_eq!(envelope.remind(Utc::now()).len(), 2);
    }

    #[test]
    fn test_remind_on_terminal_envelope_is_empty() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        envelope.void("cancelled", Utc::now()).unwrap();
        assert!(envelope.remind(Utc::now()).is_empty());
    }

    #[test]
    fn test_signing_already_signed_is_rejected() {
        let mut envelope = two_signer_envelope(SigningOrder::Parallel);
        envelope.send(Utc::now()).unwrap();
        let first = envelope.signatures[0].id;
        fill_fields(&mut envelope, first);
        envelope.complete_signature(first, None, Utc::now()).unwrap();
        let err = envelope
            .complete_signature(first, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::GuardViolation(_)));
    }
}
