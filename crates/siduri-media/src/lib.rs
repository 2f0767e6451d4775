//! External tool drivers for the siduri pipelines.
//!
//! This crate provides:
//! - A generic command runner with hard timeouts and cancellation
//! - Type-safe FFmpeg command building
//! - FFprobe duration probing
//! - Animated GIF thumbnail extraction
//! - Speech transcription with a lazily-loaded, shared model

pub mod command;
pub mod error;
pub mod probe;
pub mod thumbnail;
pub mod transcribe;

pub use command::{
    check_ffmpeg, check_ffprobe, CommandOutput, CommandRunner, ExternalCommand, FfmpegCommand,
};
pub use error::{MediaError, MediaResult};
pub use probe::{FfprobeProbe, MediaProbe};
pub use thumbnail::{GifSettings, ThumbnailExtractor};
pub use transcribe::{
    ModelCache, ModelLoader, SpeechModel, TranscribeOptions, Transcriber, WhisperCliConfig,
    WhisperCliLoader, WhisperCliModel,
};
