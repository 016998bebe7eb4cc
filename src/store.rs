//! External collaborator contracts: blob storage, persistence, notification.
//!
//! The engine core never owns a storage engine or an SMTP client. It defines
//! the operations it needs as traits, and the process entry point constructs
//! concrete implementations once and injects them; no lazily-initialized
//! process-wide singletons. In-memory implementations live here for tests
//! and for embedding the engine without external services.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use crate::envelope::{Envelope, StoredDocument};
use crate::error::{Error, Result};

/// Opaque key → bytes blob store holding the original and final PDFs.
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    /// Store `bytes` and return the key they landed under.
    fn put(&self, bytes: Vec<u8>) -> Result<String>;
}

/// Durable persistence for documents and envelopes.
pub trait EnvelopeStore: Send + Sync {
    /// Record a newly uploaded document.
    fn insert_document(&self, document: StoredDocument) -> Result<()>;
    /// Fetch a document record by id.
    fn fetch_document(&self, id: Uuid) -> Result<StoredDocument>;
    /// Record a newly created envelope.
    fn insert_envelope(&self, envelope: Envelope) -> Result<()>;
    /// Fetch an envelope (with its signatures and fields) by id.
    fn fetch_envelope(&self, id: Uuid) -> Result<Envelope>;
    /// Persist the current state of an existing envelope.
    fn update_envelope(&self, envelope: &Envelope) -> Result<()>;
    /// Every envelope referencing a document. Multiple envelopes per
    /// document are allowed; the core only enforces intra-envelope rules.
    fn envelopes_for_document(&self, document_id: Uuid) -> Result<Vec<Envelope>>;
}

/// Notification templates dispatched by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    /// A signer is asked to sign
    SignatureRequest,
    /// A signer is reminded to sign
    SignatureReminder,
    /// The sender is told one signer finished
    DocumentSigned,
    /// The sender is told every signer finished
    EnvelopeCompleted,
    /// The sender is told a signer declined
    SignatureDeclined,
    /// Unsigned signers are told the envelope was voided
    EnvelopeVoided,
}

impl NotificationTemplate {
    /// The stable template name handed to the dispatcher.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::SignatureRequest => "signature-request",
            NotificationTemplate::SignatureReminder => "signature-reminder",
            NotificationTemplate::DocumentSigned => "document-signed",
            NotificationTemplate::EnvelopeCompleted => "envelope-completed",
            NotificationTemplate::SignatureDeclined => "signature-declined",
            NotificationTemplate::EnvelopeVoided => "envelope-voided",
        }
    }
}

impl std::fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget email/notification dispatch.
///
/// The engine never consumes a dispatch result beyond logging it; a failed
/// dispatch must not roll back the state transition that triggered it.
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatch one notification.
    fn dispatch(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        variables: HashMap<String, String>,
    ) -> Result<()>;
}

/// In-memory [`BlobStore`] keyed by random UUIDs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.lock().expect("blob store lock poisoned");
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found("blob", key))
    }

    fn put(&self, bytes: Vec<u8>) -> Result<String> {
        let key = format!("blob-{}", Uuid::new_v4());
        let mut blobs = self.blobs.lock().expect("blob store lock poisoned");
        blobs.insert(key.clone(), bytes);
        Ok(key)
    }
}

/// In-memory [`EnvelopeStore`].
#[derive(Debug, Default)]
pub struct MemoryEnvelopeStore {
    documents: RwLock<HashMap<Uuid, StoredDocument>>,
    envelopes: RwLock<HashMap<Uuid, Envelope>>,
}

impl MemoryEnvelopeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnvelopeStore for MemoryEnvelopeStore {
    fn insert_document(&self, document: StoredDocument) -> Result<()> {
        let mut documents = self.documents.write().expect("document lock poisoned");
        documents.insert(document.id, document);
        Ok(())
    }

    fn fetch_document(&self, id: Uuid) -> Result<StoredDocument> {
        let documents = self.documents.read().expect("document lock poisoned");
        documents
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("document", id))
    }

    fn insert_envelope(&self, envelope: Envelope) -> Result<()> {
        let mut envelopes = self.envelopes.write().expect("envelope lock poisoned");
        envelopes.insert(envelope.id, envelope);
        Ok(())
    }

    fn fetch_envelope(&self, id: Uuid) -> Result<Envelope> {
        let envelopes = self.envelopes.read().expect("envelope lock poisoned");
        envelopes
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("envelope", id))
    }

    fn update_envelope(&self, envelope: &Envelope) -> Result<()> {
        let mut envelopes = self.envelopes.write().expect("envelope lock poisoned");
        match envelopes.get_mut(&envelope.id) {
            Some(existing) => {
                *existing = envelope.clone();
                Ok(())
            }
            None => Err(Error::not_found("envelope", envelope.id)),
        }
    }

    fn envelopes_for_document(&self, document_id: Uuid) -> Result<Vec<Envelope>> {
        let envelopes = self.envelopes.read().expect("envelope lock poisoned");
        Ok(envelopes
            .values()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }
}

/// A [`NotificationDispatcher`] that writes every dispatch to the log.
///
/// The dispatcher of last resort for deployments without an email backend;
/// the engine treats dispatch as fire-and-forget either way.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl LogDispatcher {
    /// Create a log-only dispatcher.
    pub fn new() -> Self {
        Self
    }
}

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        variables: HashMap<String, String>,
    ) -> Result<()> {
        let payload = serde_json::to_string(&variables).unwrap_or_default();
        log::info!("notification {template} -> {recipient}: {payload}");
        Ok(())
    }
}

/// A [`NotificationDispatcher`] that records every dispatch.
///
/// Useful in tests and development; production deployments inject a real
/// email dispatcher instead.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<RecordedNotification>>,
}

/// One notification recorded by [`RecordingDispatcher`].
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    /// Template dispatched
    pub template: NotificationTemplate,
    /// Recipient email
    pub recipient: String,
    /// Template variables
    pub variables: HashMap<String, String>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification dispatched so far, in order.
    pub fn sent(&self) -> Vec<RecordedNotification> {
        self.sent.lock().expect("dispatcher lock poisoned").clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        variables: HashMap<String, String>,
    ) -> Result<()> {
        let mut sent = self.sent.lock().expect("dispatcher lock poisoned");
        sent.push(RecordedNotification {
            template,
            recipient: recipient.to_string(),
            variables,
        });
        Ok(())
    }
}
