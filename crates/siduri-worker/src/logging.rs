//! Structured invocation logging.
//!
//! Every handled event gets an invocation ID so the interleaved lines of
//! concurrent invocations can be told apart.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use siduri_models::ArtifactKind;

/// Logger carrying the invocation context (ID, pipeline, source key).
#[derive(Debug, Clone)]
pub struct InvocationLogger {
    invocation_id: String,
    pipeline: ArtifactKind,
    source_key: String,
}

impl InvocationLogger {
    /// Create a logger with a fresh invocation ID.
    pub fn new(pipeline: ArtifactKind, source_key: &str) -> Self {
        Self::with_id(&Uuid::new_v4().to_string(), pipeline, source_key)
    }

    /// Create a logger with a caller-supplied invocation ID.
    pub fn with_id(invocation_id: &str, pipeline: ArtifactKind, source_key: &str) -> Self {
        Self {
            invocation_id: invocation_id.to_string(),
            pipeline,
            source_key: source_key.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            pipeline = %self.pipeline,
            key = %self.source_key,
            "Invocation started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            pipeline = %self.pipeline,
            key = %self.source_key,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            invocation_id = %self.invocation_id,
            pipeline = %self.pipeline,
            key = %self.source_key,
            "{}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            invocation_id = %self.invocation_id,
            pipeline = %self.pipeline,
            key = %self.source_key,
            "{}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            pipeline = %self.pipeline,
            key = %self.source_key,
            "Invocation completed: {}", message
        );
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn pipeline(&self) -> ArtifactKind {
        self.pipeline
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Span wrapping the whole invocation, so driver logs inherit the context.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "invocation",
            invocation_id = %self.invocation_id,
            pipeline = %self.pipeline,
            key = %self.source_key
        )
    }
}
