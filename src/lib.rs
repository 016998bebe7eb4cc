//! # esign_engine
//!
//! Multi-signer electronic signature engine: detects signature placement
//! markers inside an uploaded PDF, orchestrates an envelope of one or more
//! signers through a sequential or parallel signing workflow, and produces a
//! legally-evidentiary final PDF with every signer's field values embedded
//! plus a certificate page.
//!
//! ## Components
//!
//! - **Marker detection** ([`detector`]): finds bracketed markers such as
//!   `[SIGN_HERE_2]` in extracted page text, classifies them by field kind,
//!   and estimates their on-page position.
//! - **Envelope state machine** ([`envelope`]): signer registration,
//!   ordering policy, transition guards, completion detection.
//! - **Document assembly** ([`assembler`]): embeds completed field values
//!   (signature/initials images, date, free text) at stored coordinates and
//!   appends a certificate page.
//! - **Workflow orchestration** ([`workflow`]): the façade sequencing
//!   detection → envelope creation → per-signer completion → assembly,
//!   dispatching notifications at the documented points.
//!
//! External collaborators (blob store, persistence, and notification
//! dispatch) are injected trait objects ([`store`]); the engine owns no
//! storage engine, no SMTP client, and no process-wide state.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use esign_engine::store::{MemoryBlobStore, MemoryEnvelopeStore, RecordingDispatcher};
//! use esign_engine::workflow::SigningService;
//!
//! let service = SigningService::new(
//!     Arc::new(MemoryEnvelopeStore::new()),
//!     Arc::new(MemoryBlobStore::new()),
//!     Arc::new(RecordingDispatcher::new()),
//! );
//! // service.upload_document(...), service.create_envelope(...), ...
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Shared coordinate and field types
pub mod fields;
pub mod geometry;

// Marker detection
pub mod detector;

// Envelope entities and state machine
pub mod envelope;

// Final document assembly
pub mod assembler;

// External collaborator contracts
pub mod store;

// Workflow orchestration
pub mod workflow;

// Configuration
pub mod config;

// Internal lopdf helpers
pub(crate) mod pdf;

// Re-exports
pub use assembler::{embed_fields, AssembleOptions, EmbedField, SignerData};
pub use config::EngineConfig;
pub use detector::{
    detect_markers, group_by_signer, validate_for_signer_count, DetectedMarker, PlacementIssue,
};
pub use envelope::{
    Envelope, EnvelopeStatus, Signature, SignatureField, SignatureStatus, SignerContact,
    SigningOrder, StoredDocument,
};
pub use error::{Error, Result};
pub use fields::{FieldKind, FieldValue};
pub use geometry::{FieldRect, PageSize};
pub use workflow::{EnvelopeRequest, ExplicitField, FieldPlacement, SignerSpec, SigningService};
