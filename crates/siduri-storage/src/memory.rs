//! In-process blob store.
//!
//! Used by the local harnesses and by tests that drive the pipelines end to
//! end. Counts downloads and uploads so callers can assert that expensive
//! paths were (or were not) taken.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::client::public_url;
use crate::error::{StorageError, StorageResult};
use crate::store::BlobStore;

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub public: bool,
}

/// [`BlobStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Place an object directly, bypassing the upload counter.
    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>, content_type: &str) {
        self.objects().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
                public: false,
            },
        );
    }

    /// Read an object back for assertions.
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn store(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        // Last writer wins, like the real store; visibility resets on overwrite.
        self.objects().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                public: false,
            },
        );
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .objects()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let data = self
            .get(bucket, key)
            .ok_or_else(|| StorageError::not_found(key))?
            .data;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.store(bucket, key, data, content_type);
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;
        self.store(bucket, key, data, content_type);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.objects().remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn make_public(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut objects = self.objects();
        let object = objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::not_found(key))?;
        object.public = true;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_url("memory://local", bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let store = MemoryStore::new();
        store.put("b", "videos/a.mp4", b"video".to_vec(), "video/mp4");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("source.mp4");
        let written = store.download_to_file("b", "videos/a.mp4", &path).await.unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"video");
        assert_eq!(store.download_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryStore::new();
        assert!(!store.exists("b", "videos/a.gif").await.unwrap());
        assert!(matches!(
            store.make_public("b", "videos/a.gif").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.put("b", "videos/a.gif", b"GIF89a".to_vec(), "image/gif");

        store.delete("b", "videos/a.gif").await.unwrap();
        assert!(!store.exists("b", "videos/a.gif").await.unwrap());
        // Already gone.
        store.delete("b", "videos/a.gif").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_and_publish() {
        let store = MemoryStore::new();
        store
            .upload_bytes("b", "videos/a.vtt", b"WEBVTT\n\n".to_vec(), "text/vtt")
            .await
            .unwrap();
        store.make_public("b", "videos/a.vtt").await.unwrap();

        let object = store.get("b", "videos/a.vtt").unwrap();
        assert!(object.public);
        assert_eq!(object.content_type, "text/vtt");
        assert_eq!(store.upload_count(), 1);
        assert_eq!(store.keys("b"), vec!["videos/a.vtt".to_string()]);
    }
}
