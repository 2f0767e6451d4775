//! Candidate filtering on the event's object key.

use tracing::info;

use siduri_models::policy::{SOURCE_EXTENSIONS, VIDEOS_PREFIX};
use siduri_models::{ArtifactKind, SkipReason, UploadEvent, ValidationOutcome};

/// Decides whether an upload event is a source video for a pipeline.
#[derive(Debug, Clone)]
pub struct EventFilter {
    prefix: String,
    source_extensions: Vec<String>,
    target: ArtifactKind,
}

impl EventFilter {
    /// Filter for `target` with the default prefix and source extensions.
    pub fn new(target: ArtifactKind) -> Self {
        Self {
            prefix: VIDEOS_PREFIX.to_string(),
            source_extensions: SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            target,
        }
    }

    /// Override the watched key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Classify the event. Extensions compare case-insensitively.
    ///
    /// The pipeline's own artifact extension is rejected before anything
    /// else so an uploaded artifact can never retrigger its pipeline.
    pub fn evaluate(&self, event: &UploadEvent) -> ValidationOutcome {
        let key = event.key();
        let extension = event.extension();

        if extension.as_deref() == Some(self.target.extension()) {
            info!(key, "Skipping {} artifact", self.target);
            return ValidationOutcome::Skipped(SkipReason::WrongExtension);
        }

        if !key.starts_with(&self.prefix) {
            info!(key, prefix = %self.prefix, "Skipping key outside watched prefix");
            return ValidationOutcome::Skipped(SkipReason::WrongLocation);
        }

        match extension {
            Some(ext) if self.source_extensions.iter().any(|s| *s == ext) => {
                ValidationOutcome::Eligible
            }
            _ => {
                info!(key, "Skipping non-video object");
                ValidationOutcome::Skipped(SkipReason::WrongExtension)
            }
        }
    }

    /// True when the event should be processed further.
    pub fn is_candidate(&self, event: &UploadEvent) -> bool {
        self.evaluate(event).is_eligible()
    }
}
