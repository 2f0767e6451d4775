//! Shared data models for the siduri media pipelines.
//!
//! This crate provides:
//! - Validated upload events (trigger ingress)
//! - Eligibility outcomes and reasons
//! - Artifact kinds and deterministic derived keys
//! - Transform results and caption segments
//! - WebVTT cue track formatting
//! - Policy constants

pub mod artifact;
pub mod caption;
pub mod event;
pub mod outcome;
pub mod policy;
pub mod transform;
pub mod vtt;

// Re-export common types
pub use artifact::{key_extension, ArtifactKind, DerivedArtifactKey};
pub use caption::{CaptionSegment, Transcript};
pub use event::{EventError, UploadEvent, UploadEventPayload, BYTES_PER_MB};
pub use outcome::{RejectReason, SkipReason, ValidationOutcome};
pub use transform::TransformResult;
pub use vtt::{format_vtt, format_vtt_timestamp};
