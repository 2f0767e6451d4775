//! Artifact producers: one per pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use siduri_media::{ThumbnailExtractor, Transcriber};
use siduri_models::{format_vtt, ArtifactKind, Transcript, TransformResult};

/// Bytes of a produced artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    /// Written to a file in the scratch directory.
    File(PathBuf),
    /// Held in memory.
    Bytes(Vec<u8>),
}

/// A produced artifact ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub payload: ArtifactPayload,
    pub content_type: &'static str,
}

impl Artifact {
    pub fn file(path: PathBuf, kind: ArtifactKind) -> Self {
        Self {
            payload: ArtifactPayload::File(path),
            content_type: kind.content_type(),
        }
    }

    pub fn bytes(data: Vec<u8>, kind: ArtifactKind) -> Self {
        Self {
            payload: ArtifactPayload::Bytes(data),
            content_type: kind.content_type(),
        }
    }

    /// Size in bytes; a missing file counts as empty.
    pub async fn byte_len(&self) -> u64 {
        match &self.payload {
            ArtifactPayload::Bytes(data) => data.len() as u64,
            ArtifactPayload::File(path) => tokio::fs::metadata(path)
                .await
                .map(|m| m.len())
                .unwrap_or(0),
        }
    }
}

/// Turns a downloaded source video into an artifact.
///
/// `Success(None)` means the transform ran and found nothing to publish
/// (no speech); it is not a failure.
#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    async fn produce(
        &self,
        source: &Path,
        scratch_dir: &Path,
    ) -> TransformResult<Option<Artifact>>;
}

/// Animated GIF preview.
pub struct ThumbnailProducer {
    extractor: ThumbnailExtractor,
}

impl ThumbnailProducer {
    pub fn new(extractor: ThumbnailExtractor) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl ArtifactProducer for ThumbnailProducer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Thumbnail
    }

    async fn produce(
        &self,
        source: &Path,
        scratch_dir: &Path,
    ) -> TransformResult<Option<Artifact>> {
        let output = scratch_dir.join("thumbnail.gif");
        self.extractor
            .extract(source, &output)
            .await
            .map(|path| Some(Artifact::file(path, ArtifactKind::Thumbnail)))
    }
}

/// WebVTT caption track.
pub struct CaptionProducer {
    transcriber: Transcriber,
}

impl CaptionProducer {
    pub fn new(transcriber: Transcriber) -> Self {
        Self { transcriber }
    }

    /// WebVTT track for a transcript; `None` when nothing was said.
    pub fn captions_artifact(transcript: &Transcript) -> Option<Artifact> {
        let vtt = format_vtt(&transcript.segments)?;
        info!(segments = transcript.segments.len(), "Formatted captions");
        Some(Artifact::bytes(vtt.into_bytes(), ArtifactKind::Captions))
    }
}

#[async_trait]
impl ArtifactProducer for CaptionProducer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Captions
    }

    async fn produce(
        &self,
        source: &Path,
        scratch_dir: &Path,
    ) -> TransformResult<Option<Artifact>> {
        self.transcriber
            .transcribe(source, scratch_dir)
            .await
            .map(|transcript| Self::captions_artifact(&transcript))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siduri_media::{ModelCache, SpeechModel, TranscribeOptions};
    use siduri_models::CaptionSegment;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_byte_len() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let file = Artifact::file(path, ArtifactKind::Thumbnail);
        assert_eq!(file.byte_len().await, 6);
        assert_eq!(file.content_type, "image/gif");

        let missing = Artifact::file(dir.path().join("missing.gif"), ArtifactKind::Thumbnail);
        assert_eq!(missing.byte_len().await, 0);

        let bytes = Artifact::bytes(b"WEBVTT\n\n".to_vec(), ArtifactKind::Captions);
        assert_eq!(bytes.byte_len().await, 8);
    }

    #[test]
    fn test_empty_transcript_has_no_captions() {
        assert_eq!(CaptionProducer::captions_artifact(&Transcript::default()), None);
    }

    #[test]
    fn test_transcript_becomes_vtt_track() {
        let transcript = Transcript {
            segments: vec![
                CaptionSegment::new(0.0, 1.5, "Hola"),
                CaptionSegment::new(1.5, 3.0, "mundo"),
            ],
            ..Default::default()
        };

        let artifact = CaptionProducer::captions_artifact(&transcript).unwrap();

        assert_eq!(artifact.content_type, "text/vtt");
        let ArtifactPayload::Bytes(data) = artifact.payload else {
            panic!("captions should be held in memory");
        };
        let vtt = String::from_utf8(data).unwrap();
        assert!(vtt.starts_with("WEBVTT"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:01.500\nHola"));
        assert!(vtt.contains("mundo"));
    }

    struct SilentModel;

    #[async_trait]
    impl SpeechModel for SilentModel {
        fn name(&self) -> &str {
            "silent"
        }

        async fn transcribe(
            &self,
            _audio_path: &Path,
            _options: &TranscribeOptions,
            _budget: Duration,
        ) -> TransformResult<Transcript> {
            TransformResult::Success(Transcript::default())
        }
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and a sample video at SIDURI_SAMPLE_VIDEO"]
    async fn test_silent_video_produces_nothing() {
        let sample = std::env::var("SIDURI_SAMPLE_VIDEO").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let producer = CaptionProducer::new(Transcriber::new(
            Arc::new(ModelCache::preloaded(Arc::new(SilentModel))),
            TranscribeOptions::default(),
            Duration::from_secs(60),
        ));

        let result = producer.produce(Path::new(&sample), dir.path()).await;
        assert_eq!(result, TransformResult::Success(None));
    }
}
