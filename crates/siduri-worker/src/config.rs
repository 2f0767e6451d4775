//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use siduri_media::{TranscribeOptions, WhisperCliConfig};
use siduri_models::policy::{
    DEFAULT_BEAM_SIZE, DEFAULT_MAX_DURATION_SECS, DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_MODEL_VARIANT,
    DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_TARGET_LANGUAGE, DEFAULT_THUMBNAIL_TIMEOUT_SECS,
    DEFAULT_TRANSCRIBE_TIMEOUT_SECS, DEFAULT_VAD_MIN_SILENCE_MS,
};

use crate::error::{WorkerError, WorkerResult};

/// Default VAD weights file name.
pub const DEFAULT_VAD_MODEL_FILE: &str = "ggml-silero-v5.1.2.bin";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Store name used when an event carries none
    pub bucket: Option<String>,
    /// Size gate ceiling (MB)
    pub max_file_size_mb: u64,
    /// Duration gate ceiling (seconds)
    pub max_duration_secs: u64,
    /// Metadata probe budget
    pub probe_timeout: Duration,
    /// GIF encoder budget
    pub thumbnail_timeout: Duration,
    /// Audio extraction + speech recognition budget
    pub transcribe_timeout: Duration,
    /// Model size/variant (tiny, base, small, medium, large-v3, ...)
    pub model_variant: String,
    /// Directory holding model weights
    pub model_dir: PathBuf,
    /// Explicit model file, overrides `model_dir` + `model_variant`
    pub model_path: Option<PathBuf>,
    /// VAD weights, defaults to `model_dir/ggml-silero-v5.1.2.bin`
    pub vad_model_path: Option<PathBuf>,
    /// Speech CLI executable
    pub whisper_bin: String,
    /// Inference threads
    pub whisper_threads: u32,
    /// Target language code
    pub language: String,
    /// Beam search width
    pub beam_size: u32,
    /// VAD minimum silence duration
    pub vad_min_silence_ms: u32,
    /// Parent directory of per-invocation scratch directories
    pub work_dir: PathBuf,
    /// Maximum concurrent invocations
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            thumbnail_timeout: Duration::from_secs(DEFAULT_THUMBNAIL_TIMEOUT_SECS),
            transcribe_timeout: Duration::from_secs(DEFAULT_TRANSCRIBE_TIMEOUT_SECS),
            model_variant: DEFAULT_MODEL_VARIANT.to_string(),
            model_dir: PathBuf::from("/models"),
            model_path: None,
            vad_model_path: None,
            whisper_bin: "whisper-cli".to_string(),
            whisper_threads: 4,
            language: DEFAULT_TARGET_LANGUAGE.to_string(),
            beam_size: DEFAULT_BEAM_SIZE,
            vad_min_silence_ms: DEFAULT_VAD_MIN_SILENCE_MS,
            work_dir: std::env::temp_dir().join("siduri"),
            max_concurrent_jobs: 2,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bucket: env_string("GCS_BUCKET"),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            max_duration_secs: env_parse("MAX_DURATION_SECS")
                .unwrap_or(defaults.max_duration_secs),
            probe_timeout: env_parse("PROBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            thumbnail_timeout: env_parse("THUMBNAIL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.thumbnail_timeout),
            transcribe_timeout: env_parse("TRANSCRIBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.transcribe_timeout),
            model_variant: env_string("WHISPER_MODEL").unwrap_or(defaults.model_variant),
            model_dir: env_string("WHISPER_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            model_path: env_string("WHISPER_MODEL_PATH").map(PathBuf::from),
            vad_model_path: env_string("WHISPER_VAD_MODEL_PATH").map(PathBuf::from),
            whisper_bin: env_string("WHISPER_BIN").unwrap_or(defaults.whisper_bin),
            whisper_threads: env_parse("WHISPER_THREADS").unwrap_or(defaults.whisper_threads),
            language: env_string("TARGET_LANGUAGE").unwrap_or(defaults.language),
            beam_size: env_parse("WHISPER_BEAM_SIZE").unwrap_or(defaults.beam_size),
            vad_min_silence_ms: env_parse("VAD_MIN_SILENCE_MS")
                .unwrap_or(defaults.vad_min_silence_ms),
            work_dir: env_string("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .unwrap_or(defaults.max_concurrent_jobs),
        }
    }

    /// Reject settings that would make every invocation fail or hang.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_file_size_mb == 0 {
            return Err(WorkerError::config_error("MAX_FILE_SIZE_MB must be > 0"));
        }
        if self.max_duration_secs == 0 {
            return Err(WorkerError::config_error("MAX_DURATION_SECS must be > 0"));
        }
        for (name, timeout) in [
            ("PROBE_TIMEOUT_SECS", self.probe_timeout),
            ("THUMBNAIL_TIMEOUT_SECS", self.thumbnail_timeout),
            ("TRANSCRIBE_TIMEOUT_SECS", self.transcribe_timeout),
        ] {
            if timeout.is_zero() {
                return Err(WorkerError::config_error(format!("{} must be > 0", name)));
            }
        }
        if self.beam_size == 0 {
            return Err(WorkerError::config_error("WHISPER_BEAM_SIZE must be > 0"));
        }
        if self.language.trim().is_empty() {
            return Err(WorkerError::config_error("TARGET_LANGUAGE must not be empty"));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_JOBS must be > 0"));
        }
        Ok(())
    }

    /// Recognition options for the transcriber.
    pub fn transcribe_options(&self) -> TranscribeOptions {
        TranscribeOptions {
            language: self.language.clone(),
            beam_size: self.beam_size,
            vad_enabled: true,
            vad_min_silence_ms: self.vad_min_silence_ms,
            threads: self.whisper_threads,
        }
    }

    /// Model file locations for the whisper.cpp backend.
    pub fn whisper_cli_config(&self) -> WhisperCliConfig {
        let model_path = self.model_path.clone().unwrap_or_else(|| {
            self.model_dir
                .join(WhisperCliConfig::model_file_name(&self.model_variant))
        });
        let vad_model_path = self
            .vad_model_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join(DEFAULT_VAD_MODEL_FILE));

        WhisperCliConfig {
            binary: self.whisper_bin.clone(),
            model_path,
            vad_model_path: Some(vad_model_path),
        }
    }
}
