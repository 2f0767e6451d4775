//! Worker error types.

use thiserror::Error;

use siduri_models::ArtifactKind;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{pipeline} transform failed: {diagnostic}")]
    TransformFailed {
        pipeline: ArtifactKind,
        diagnostic: String,
    },

    #[error("{pipeline} transform timed out after {timeout_secs}s")]
    TransformTimedOut {
        pipeline: ArtifactKind,
        timeout_secs: u64,
    },

    /// Uploaded but could not be made public, and the rollback failed too.
    /// The object is left private at `key`; a redelivery would skip it.
    #[error("Published {key} but could not make it public ({acl}) or remove it ({rollback})")]
    PartialPublish {
        key: String,
        acl: String,
        rollback: String,
    },

    #[error("Scratch space error: {0}")]
    Scratch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid event: {0}")]
    Event(#[from] siduri_models::EventError),

    #[error("Storage error: {0}")]
    Storage(#[from] siduri_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] siduri_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn transform_failed(pipeline: ArtifactKind, diagnostic: impl Into<String>) -> Self {
        Self::TransformFailed {
            pipeline,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn scratch(msg: impl Into<String>) -> Self {
        Self::Scratch(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if a redelivery of the same event could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::Storage(_)
                | WorkerError::Io(_)
                | WorkerError::Scratch(_)
                | WorkerError::TransformTimedOut { .. }
        )
    }
}
