//! Derived artifact kinds and their deterministic storage keys.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of artifact produced from an uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Short animated GIF preview.
    Thumbnail,
    /// WebVTT caption track.
    Captions,
}

impl ArtifactKind {
    /// File extension of the artifact, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "gif",
            ArtifactKind::Captions => "vtt",
        }
    }

    /// Content type used when publishing.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "image/gif",
            ArtifactKind::Captions => "text/vtt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::Captions => "captions",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thumbnail" | "gif" => Ok(ArtifactKind::Thumbnail),
            "captions" | "subtitles" | "vtt" => Ok(ArtifactKind::Captions),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// Storage key of a derived artifact.
///
/// Always computed from the source key, so two invocations on the same
/// source agree on where the artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DerivedArtifactKey(String);

impl DerivedArtifactKey {
    /// Replace the source key's extension with the artifact's extension.
    ///
    /// The directory prefix is preserved. A key without an extension gets
    /// the artifact extension appended.
    pub fn for_source(source_key: &str, kind: ArtifactKind) -> Self {
        let stem = match key_extension(source_key) {
            Some(ext) => &source_key[..source_key.len() - ext.len() - 1],
            None => source_key,
        };
        Self(format!("{}.{}", stem, kind.extension()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DerivedArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension of the last path segment of a key, if any.
///
/// Dot-files (`videos/.hidden`) and trailing dots have no extension.
pub fn key_extension(key: &str) -> Option<&str> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let dot = file_name.rfind('.')?;
    if dot == 0 || dot == file_name.len() - 1 {
        return None;
    }
    Some(&file_name[dot + 1..])
}
