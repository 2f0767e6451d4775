//! S3-compatible bucket client.
//!
//! Talks to any store exposing the S3 XML API. The default endpoint is
//! Google Cloud Storage's interoperability endpoint, authenticated with
//! HMAC keys.

use async_trait::async_trait;
use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::BlobStore;

/// Default S3-compatible endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "https://storage.googleapis.com";
/// Default base for public object URLs.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";

/// Configuration for the bucket client.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Signing region (usually "auto")
    pub region: String,
    /// Base for public URLs: `<base>/<bucket>/<key>`
    pub public_base_url: String,
}

impl BucketConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT_URL.to_string()),
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string()),
        })
    }
}

/// Bucket client over the S3 API.
#[derive(Clone)]
pub struct BucketClient {
    client: Client,
    public_base_url: String,
}

impl BucketClient {
    /// Create a new client from configuration.
    pub fn new(config: BucketConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "siduri",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(BucketConfig::from_env()?))
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for BucketClient {
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        debug!("Downloading gs://{}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;
        file.flush().await?;

        info!("Downloaded {} ({} bytes) to {}", key, written, path.display());
        Ok(written)
    }

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        Ok(())
    }

    async fn make_public(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::AclFailed(e.to_string()))?;

        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_url(&self.public_base_url, bucket, key)
    }
}

/// `<base>/<bucket>/<key>`
pub fn public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("https://storage.googleapis.com/", "media", "videos/a.gif"),
            "https://storage.googleapis.com/media/videos/a.gif"
        );
    }
}
