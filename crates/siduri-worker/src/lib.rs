//! Event-driven media worker.
//!
//! Two pipelines react to object uploads under `videos/`:
//! - thumbnail: a 3-second looping GIF from the start of the video
//! - captions: a WebVTT track transcribed from the audio
//!
//! Each is an independent [`Pipeline`] invoked once per upload event.

pub mod config;
pub mod error;
pub mod event_filter;
pub mod idempotency;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod producer;
pub mod publisher;
pub mod scratch;
pub mod validator;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use event_filter::EventFilter;
pub use idempotency::IdempotencyGuard;
pub use logging::InvocationLogger;
pub use pipeline::{FailurePolicy, InvocationOutcome, Pipeline, PipelinePolicy};
pub use producer::{
    Artifact, ArtifactPayload, ArtifactProducer, CaptionProducer, ThumbnailProducer,
};
pub use publisher::{Publication, ResultPublisher, Visibility};
pub use scratch::ScratchSpace;
pub use validator::EligibilityValidator;

/// Initialize tracing: colored output for dev, JSON when `LOG_FORMAT=json`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("siduri=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
