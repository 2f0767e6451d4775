//! Policy constants shared by both pipelines.

/// Only objects under this prefix are considered.
pub const VIDEOS_PREFIX: &str = "videos/";

/// Accepted source extensions (lowercase, no dot).
pub const SOURCE_EXTENSIONS: &[&str] = &["mp4", "webm"];

/// Size gate ceiling in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 500;
/// Duration gate ceiling in seconds.
pub const DEFAULT_MAX_DURATION_SECS: u64 = 600;
/// Budget for the metadata probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;
/// Budget for the GIF encoder.
pub const DEFAULT_THUMBNAIL_TIMEOUT_SECS: u64 = 60;
/// Budget for audio extraction plus speech recognition.
pub const DEFAULT_TRANSCRIBE_TIMEOUT_SECS: u64 = 900;

/// Thumbnail GIF settings
pub const GIF_START_SECS: f64 = 0.0;
pub const GIF_WINDOW_SECS: f64 = 3.0;
pub const GIF_FPS: u32 = 10;
pub const GIF_SCALE_WIDTH: u32 = 480;
/// `-loop 0` loops forever.
pub const GIF_LOOP_FOREVER: i32 = 0;

/// Transcription settings
pub const DEFAULT_TARGET_LANGUAGE: &str = "es";
pub const DEFAULT_BEAM_SIZE: u32 = 5;
pub const DEFAULT_VAD_MIN_SILENCE_MS: u32 = 500;
pub const DEFAULT_MODEL_VARIANT: &str = "small";

/// Audio format expected by the speech model.
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;
