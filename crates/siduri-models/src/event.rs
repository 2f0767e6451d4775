//! Store-notification events that trigger a pipeline invocation.
//!
//! The trigger payload is loosely typed on the wire (`size` arrives as a
//! decimal string from GCS, as an integer from most test harnesses), so it is
//! parsed into [`UploadEventPayload`] first and then validated into an
//! immutable [`UploadEvent`].

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a trigger payload.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Raw trigger payload as delivered by the store notification.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadEventPayload {
    /// Store (bucket) name; optional, falls back to the configured bucket.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Object key.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared size in bytes, as integer or decimal string.
    #[serde(default)]
    pub size: Option<SizeField>,
    /// Content type declared by the uploader.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Object creation time (RFC 3339).
    #[serde(default)]
    pub time_created: Option<String>,
}

/// The two encodings of the `size` field seen in practice.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SizeField {
    Number(u64),
    Text(String),
}

impl SizeField {
    fn bytes(&self) -> Result<u64, EventError> {
        match self {
            SizeField::Number(n) => Ok(*n),
            SizeField::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| EventError::InvalidSize(s.clone())),
        }
    }
}

/// A validated upload notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct UploadEvent {
    bucket: String,
    key: String,
    size_bytes: u64,
    content_type: Option<String>,
    time_created: Option<DateTime<Utc>>,
}

impl UploadEvent {
    /// Build an event directly (used by local harnesses and tests).
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size_bytes,
            content_type: None,
            time_created: None,
        }
    }

    /// Attach a declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Validate a raw payload.
    ///
    /// `default_bucket` is used when the payload carries no bucket. The key is
    /// required and must be non-empty; a missing size is treated as an ingress
    /// error rather than silently becoming zero.
    pub fn from_payload(
        payload: UploadEventPayload,
        default_bucket: Option<&str>,
    ) -> Result<Self, EventError> {
        let bucket = payload
            .bucket
            .filter(|b| !b.trim().is_empty())
            .or_else(|| default_bucket.map(str::to_string))
            .filter(|b| !b.trim().is_empty())
            .ok_or(EventError::MissingField("bucket"))?;

        let key = payload
            .name
            .filter(|n| !n.is_empty())
            .ok_or(EventError::MissingField("name"))?;

        let size_bytes = payload
            .size
            .as_ref()
            .ok_or(EventError::MissingField("size"))?
            .bytes()?;

        let time_created = payload
            .time_created
            .map(|t| {
                DateTime::parse_from_rfc3339(&t)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| EventError::InvalidTimestamp(t))
            })
            .transpose()?;

        Ok(Self {
            bucket,
            key,
            size_bytes,
            content_type: payload.content_type.filter(|c| !c.is_empty()),
            time_created,
        })
    }

    /// Parse and validate a JSON trigger payload.
    pub fn from_json(json: &str, default_bucket: Option<&str>) -> Result<Self, EventError> {
        let payload: UploadEventPayload = serde_json::from_str(json)?;
        Self::from_payload(payload, default_bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Declared size in megabytes (1 MB = 1024 * 1024 bytes).
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB as f64
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn time_created(&self) -> Option<DateTime<Utc>> {
        self.time_created
    }

    /// Lowercased extension of the object key, without the dot.
    pub fn extension(&self) -> Option<String> {
        crate::artifact::key_extension(&self.key).map(|e| e.to_ascii_lowercase())
    }
}

/// Bytes per megabyte used by the size gate.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_as_string() {
        let event = UploadEvent::from_json(
            r#"{"bucket":"b","name":"videos/a.mp4","size":"1048576"}"#,
            None,
        )
        .unwrap();
        assert_eq!(event.size_bytes(), 1_048_576);
        assert!((event.size_mb() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_size_as_number_and_optional_fields() {
        let event = UploadEvent::from_json(
            r#"{"bucket":"b","name":"videos/a.webm","size":42,
                "contentType":"video/webm","timeCreated":"2024-05-01T10:00:00.123Z"}"#,
            None,
        )
        .unwrap();
        assert_eq!(event.size_bytes(), 42);
        assert_eq!(event.content_type(), Some("video/webm"));
        assert!(event.time_created().is_some());
        assert_eq!(event.extension().as_deref(), Some("webm"));
    }

    #[test]
    fn test_bucket_falls_back_to_default() {
        let json = r#"{"name":"videos/a.mp4","size":1}"#;
        let event = UploadEvent::from_json(json, Some("fallback")).unwrap();
        assert_eq!(event.bucket(), "fallback");

        let err = UploadEvent::from_json(r#"{"name":"videos/a.mp4","size":1}"#, None).unwrap_err();
        assert!(matches!(err, EventError::MissingField("bucket")));
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert!(matches!(
            UploadEvent::from_json(r#"{"bucket":"b","size":1}"#, None),
            Err(EventError::MissingField("name"))
        ));
        assert!(matches!(
            UploadEvent::from_json(r#"{"bucket":"b","name":"videos/a.mp4"}"#, None),
            Err(EventError::MissingField("size"))
        ));
        assert!(matches!(
            UploadEvent::from_json(r#"{"bucket":"b","name":"videos/a.mp4","size":"-3"}"#, None),
            Err(EventError::InvalidSize(_))
        ));
        assert!(matches!(
            UploadEvent::from_json("not json", None),
            Err(EventError::Malformed(_))
        ));
    }
}
