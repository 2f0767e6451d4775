//! Existence check on the derived artifact key.

use std::sync::Arc;
use tracing::info;

use siduri_models::{ArtifactKind, DerivedArtifactKey, SkipReason, ValidationOutcome};
use siduri_storage::BlobStore;

use crate::error::WorkerResult;

/// Skips work whose artifact is already in the store.
///
/// Storage errors propagate: an unanswerable existence check never counts
/// as "absent".
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn BlobStore>,
    kind: ArtifactKind,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn BlobStore>, kind: ArtifactKind) -> Self {
        Self { store, kind }
    }

    /// Key the artifact of `source_key` is published under.
    pub fn target_key(&self, source_key: &str) -> DerivedArtifactKey {
        DerivedArtifactKey::for_source(source_key, self.kind)
    }

    /// `Skipped(AlreadyExists)` when the artifact is present, else `Eligible`.
    pub async fn check(
        &self,
        bucket: &str,
        target: &DerivedArtifactKey,
    ) -> WorkerResult<ValidationOutcome> {
        if self.store.exists(bucket, target.as_str()).await? {
            info!(target = %target, "{} already exists, skipping", self.kind);
            return Ok(ValidationOutcome::Skipped(SkipReason::AlreadyExists));
        }
        Ok(ValidationOutcome::Eligible)
    }
}
