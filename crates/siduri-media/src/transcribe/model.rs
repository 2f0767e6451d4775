//! Speech model capability and its process-wide cache.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use siduri_models::policy::{DEFAULT_BEAM_SIZE, DEFAULT_TARGET_LANGUAGE, DEFAULT_VAD_MIN_SILENCE_MS};
use siduri_models::{Transcript, TransformResult};

use crate::error::MediaResult;

/// Recognition parameters passed to the model on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    /// Target language code (no auto-detection)
    pub language: String,
    /// Beam search width
    pub beam_size: u32,
    /// Voice activity detection on/off
    pub vad_enabled: bool,
    /// Minimum silence separating speech regions
    pub vad_min_silence_ms: u32,
    /// Inference threads
    pub threads: u32,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_TARGET_LANGUAGE.to_string(),
            beam_size: DEFAULT_BEAM_SIZE,
            vad_enabled: true,
            vad_min_silence_ms: DEFAULT_VAD_MIN_SILENCE_MS,
            threads: 4,
        }
    }
}

/// A loaded speech-to-text model.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Human-readable model identifier for logs.
    fn name(&self) -> &str;

    /// Transcribe a 16 kHz mono WAV file within `budget`.
    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        budget: Duration,
    ) -> TransformResult<Transcript>;
}

/// Creates a [`SpeechModel`]; called at most once per successful load.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> MediaResult<Arc<dyn SpeechModel>>;
}

/// Lazily-initialized, shared speech model.
///
/// The first caller runs the loader; concurrent first callers wait on the
/// same initialization. A failed load leaves the cache empty so a later
/// invocation can try again. Once loaded the model is never evicted.
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn SpeechModel>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    /// Cache that starts with an already-loaded model.
    pub fn preloaded(model: Arc<dyn SpeechModel>) -> Self {
        Self {
            loader: Arc::new(Preloaded(model.clone())),
            model: OnceCell::new_with(Some(model)),
        }
    }

    /// Return the model, loading it on first use.
    pub async fn get(&self) -> MediaResult<Arc<dyn SpeechModel>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                info!("Loading speech model");
                let model = self.loader.load().await?;
                info!(model = model.name(), "Speech model loaded");
                Ok::<_, crate::error::MediaError>(model)
            })
            .await?;
        Ok(model.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }
}

struct Preloaded(Arc<dyn SpeechModel>);

#[async_trait]
impl ModelLoader for Preloaded {
    async fn load(&self) -> MediaResult<Arc<dyn SpeechModel>> {
        Ok(self.0.clone())
    }
}
