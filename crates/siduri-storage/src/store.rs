//! The blob store seen by the pipelines.

use async_trait::async_trait;
use std::path::Path;

use crate::error::StorageResult;

/// Operations the pipelines need from the blob store.
///
/// Download and upload deadlines are the implementation's concern.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether an object exists.
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Stream an object into a local file. Returns bytes written.
    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64>;

    /// Upload an in-memory payload.
    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Upload a local file.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Grant public read on an object.
    async fn make_public(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Public URL of an object (meaningful once it is publicly readable).
    fn public_url(&self, bucket: &str, key: &str) -> String;
}
