//! Speech-to-text transcription.
//!
//! The [`Transcriber`] extracts the audio track to 16 kHz mono WAV with
//! FFmpeg, then hands it to a [`SpeechModel`] obtained from a shared
//! [`ModelCache`]. Both steps run under one wall-clock budget.

pub mod model;
pub mod whisper_cli;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use siduri_models::policy::{DEFAULT_TRANSCRIBE_TIMEOUT_SECS, SPEECH_SAMPLE_RATE};
use siduri_models::{Transcript, TransformResult};

use crate::command::{CommandRunner, ExternalCommand, FfmpegCommand};

pub use model::{ModelCache, ModelLoader, SpeechModel, TranscribeOptions};
pub use whisper_cli::{WhisperCliConfig, WhisperCliLoader, WhisperCliModel};

/// FFmpeg command that extracts speech-ready audio from a video.
pub fn speech_audio_command(source: &Path, wav_out: &Path) -> ExternalCommand {
    FfmpegCommand::new(source, wav_out)
        .no_video()
        .audio_channels(1)
        .audio_sample_rate(SPEECH_SAMPLE_RATE)
        .audio_codec("pcm_s16le")
        .into_command()
}

/// Transcription driver bounded by a hard timeout.
#[derive(Clone)]
pub struct Transcriber {
    cache: Arc<ModelCache>,
    options: TranscribeOptions,
    timeout: Duration,
}

impl Transcriber {
    pub fn new(cache: Arc<ModelCache>, options: TranscribeOptions, timeout: Duration) -> Self {
        Self {
            cache,
            options,
            timeout,
        }
    }

    /// Transcriber with default options and budget.
    pub fn with_defaults(cache: Arc<ModelCache>) -> Self {
        Self::new(
            cache,
            TranscribeOptions::default(),
            Duration::from_secs(DEFAULT_TRANSCRIBE_TIMEOUT_SECS),
        )
    }

    pub fn options(&self) -> &TranscribeOptions {
        &self.options
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Transcribe the full audio track of `source`.
    ///
    /// Intermediate files are written into `scratch_dir`, which the caller
    /// owns and cleans up. Exceeding the budget drops the in-flight work
    /// (child processes are killed) and yields `TimedOut`.
    pub async fn transcribe(
        &self,
        source: &Path,
        scratch_dir: &Path,
    ) -> TransformResult<Transcript> {
        let started = Instant::now();

        match tokio::time::timeout(self.timeout, self.run(source, scratch_dir, started)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Transcription timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                );
                TransformResult::TimedOut
            }
        }
    }

    async fn run(
        &self,
        source: &Path,
        scratch_dir: &Path,
        started: Instant,
    ) -> TransformResult<Transcript> {
        let wav = scratch_dir.join("speech.wav");

        let extracted = CommandRunner::new()
            .with_timeout(self.timeout)
            .run(&speech_audio_command(source, &wav))
            .await;
        if !extracted.is_success() {
            return extracted.map(|_| Transcript::default());
        }

        let model = match self.cache.get().await {
            Ok(model) => model,
            Err(e) => return e.into_transform_result(),
        };

        let remaining = self.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return TransformResult::TimedOut;
        }

        info!(
            model = model.name(),
            language = %self.options.language,
            beam_size = self.options.beam_size,
            "Transcribing audio"
        );

        let result = model.transcribe(&wav, &self.options, remaining).await;
        if let TransformResult::Success(transcript) = &result {
            match (&transcript.language, transcript.language_probability) {
                (Some(language), Some(p)) => {
                    info!("Detected language: {} (probability: {:.2})", language, p)
                }
                (Some(language), None) => info!("Detected language: {}", language),
                _ => {}
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use siduri_models::CaptionSegment;

    struct FixedModel;

    #[async_trait]
    impl SpeechModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn transcribe(
            &self,
            _audio_path: &Path,
            _options: &TranscribeOptions,
            _budget: Duration,
        ) -> TransformResult<Transcript> {
            TransformResult::Success(Transcript {
                segments: vec![CaptionSegment::new(0.0, 1.0, "hola")],
                language: Some("es".to_string()),
                language_probability: Some(0.99),
            })
        }
    }

    #[test]
    fn test_speech_audio_command() {
        let cmd = speech_audio_command(Path::new("/tmp/in.webm"), Path::new("/tmp/speech.wav"));
        let args = cmd.get_args();
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert_eq!(cmd.program(), "ffmpeg");
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args[pos("-ar") + 1], "16000");
        assert_eq!(args[pos("-ac") + 1], "1");
        assert_eq!(args[pos("-c:a") + 1], "pcm_s16le");
    }

    #[tokio::test]
    async fn test_extraction_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(
            Arc::new(ModelCache::preloaded(Arc::new(FixedModel))),
            TranscribeOptions::default(),
            Duration::from_secs(10),
        );

        // Either ffmpeg is missing or it rejects the nonexistent input.
        let result = transcriber
            .transcribe(Path::new("/nonexistent/input.mp4"), dir.path())
            .await;
        assert_eq!(result.label(), "failed");
    }
}
