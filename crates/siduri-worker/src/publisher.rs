//! Artifact publication.

use std::sync::Arc;
use tracing::{info, warn};

use siduri_models::DerivedArtifactKey;
use siduri_storage::BlobStore;

use crate::error::{WorkerError, WorkerResult};
use crate::producer::{Artifact, ArtifactPayload};

/// Access level applied after upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Grant anonymous read and report the public URL.
    Public,
    /// Keep the bucket's default access.
    BucketDefault,
}

/// Where a published artifact landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub key: DerivedArtifactKey,
    pub bytes: u64,
    pub public_url: Option<String>,
}

/// Uploads artifacts under their derived key.
#[derive(Clone)]
pub struct ResultPublisher {
    store: Arc<dyn BlobStore>,
    visibility: Visibility,
}

impl ResultPublisher {
    pub fn new(store: Arc<dyn BlobStore>, visibility: Visibility) -> Self {
        Self { store, visibility }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Upload `artifact` to `bucket/key` with its content type.
    ///
    /// Under [`Visibility::Public`] a failed visibility change removes the
    /// uploaded object again, so a redelivered event finds no artifact and
    /// redoes the work instead of skipping a private one.
    pub async fn publish(
        &self,
        bucket: &str,
        key: &DerivedArtifactKey,
        artifact: Artifact,
    ) -> WorkerResult<Publication> {
        let bytes = artifact.byte_len().await;
        match artifact.payload {
            ArtifactPayload::File(path) => {
                self.store
                    .upload_file(bucket, key.as_str(), &path, artifact.content_type)
                    .await?
            }
            ArtifactPayload::Bytes(data) => {
                self.store
                    .upload_bytes(bucket, key.as_str(), data, artifact.content_type)
                    .await?
            }
        }

        let public_url = match self.visibility {
            Visibility::Public => {
                if let Err(acl) = self.store.make_public(bucket, key.as_str()).await {
                    warn!("Could not make {} public, removing it: {}", key, acl);
                    return match self.store.delete(bucket, key.as_str()).await {
                        Ok(()) => Err(acl.into()),
                        Err(rollback) => Err(WorkerError::PartialPublish {
                            key: key.to_string(),
                            acl: acl.to_string(),
                            rollback: rollback.to_string(),
                        }),
                    };
                }
                let url = self.store.public_url(bucket, key.as_str());
                info!("Uploaded {} publicly: {}", key, url);
                Some(url)
            }
            Visibility::BucketDefault => {
                info!("Uploaded {} ({} bytes)", key, bytes);
                None
            }
        };

        Ok(Publication {
            key: key.clone(),
            bytes,
            public_url,
        })
    }
}
