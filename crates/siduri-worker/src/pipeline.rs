//! Per-event orchestration.
//!
//! One [`Pipeline`] handles one artifact kind. For each upload event it runs
//! the gates in order (candidate filter, size, idempotency), downloads the
//! source into a fresh scratch directory, applies the duration gate,
//! produces the artifact and publishes it. The scratch directory is removed
//! on every exit path.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use siduri_media::{MediaProbe, ModelCache, ThumbnailExtractor, Transcriber};
use siduri_models::{
    ArtifactKind, DerivedArtifactKey, RejectReason, SkipReason, TransformResult, UploadEvent,
    ValidationOutcome,
};
use siduri_storage::BlobStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::event_filter::EventFilter;
use crate::idempotency::IdempotencyGuard;
use crate::logging::InvocationLogger;
use crate::metrics;
use crate::producer::{Artifact, ArtifactProducer, CaptionProducer, ThumbnailProducer};
use crate::publisher::{ResultPublisher, Visibility};
use crate::scratch::ScratchSpace;
use crate::validator::EligibilityValidator;

/// What happens when the transform fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and finish the invocation normally.
    Skip,
    /// Surface the failure to the caller so it can record or redeliver.
    FailInvocation,
}

/// Per-pipeline behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePolicy {
    pub kind: ArtifactKind,
    pub on_transform_failure: FailurePolicy,
    pub visibility: Visibility,
}

impl PipelinePolicy {
    /// Thumbnails: failures are skipped, the GIF is made public.
    pub fn thumbnail() -> Self {
        Self {
            kind: ArtifactKind::Thumbnail,
            on_transform_failure: FailurePolicy::Skip,
            visibility: Visibility::Public,
        }
    }

    /// Captions: failures fail the invocation, the track keeps bucket access.
    pub fn captions() -> Self {
        Self {
            kind: ArtifactKind::Captions,
            on_transform_failure: FailurePolicy::FailInvocation,
            visibility: Visibility::BucketDefault,
        }
    }
}

/// How an invocation ended, when it did not end in an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Published {
        key: DerivedArtifactKey,
        bytes: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        public_url: Option<String>,
    },
    Skipped {
        reason: SkipReason,
    },
    Rejected {
        reason: RejectReason,
    },
    /// The transform ran and found nothing to publish.
    NoContent,
    /// The transform failed and the pipeline skips failures.
    TransformFailed {
        diagnostic: String,
    },
    /// The transform ran out of budget and the pipeline skips failures.
    TimedOut,
}

impl InvocationOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            InvocationOutcome::Published { .. } => "published",
            InvocationOutcome::Skipped { .. } => "skipped",
            InvocationOutcome::Rejected { .. } => "rejected",
            InvocationOutcome::NoContent => "no_content",
            InvocationOutcome::TransformFailed { .. } => "transform_failed",
            InvocationOutcome::TimedOut => "timed_out",
        }
    }
}

/// Event handler for one artifact kind.
#[derive(Clone)]
pub struct Pipeline {
    policy: PipelinePolicy,
    filter: EventFilter,
    validator: EligibilityValidator,
    guard: IdempotencyGuard,
    publisher: ResultPublisher,
    producer: Arc<dyn ArtifactProducer>,
    store: Arc<dyn BlobStore>,
    work_dir: PathBuf,
    transform_timeout_secs: u64,
}

impl Pipeline {
    /// Assemble a pipeline around an arbitrary producer.
    pub fn new(
        policy: PipelinePolicy,
        config: &WorkerConfig,
        store: Arc<dyn BlobStore>,
        probe: Arc<dyn MediaProbe>,
        producer: Arc<dyn ArtifactProducer>,
    ) -> Self {
        let transform_timeout = match policy.kind {
            ArtifactKind::Thumbnail => config.thumbnail_timeout,
            ArtifactKind::Captions => config.transcribe_timeout,
        };

        Self {
            policy,
            filter: EventFilter::new(policy.kind),
            validator: EligibilityValidator::new(
                config.max_file_size_mb,
                config.max_duration_secs,
                probe,
            ),
            guard: IdempotencyGuard::new(store.clone(), policy.kind),
            publisher: ResultPublisher::new(store.clone(), policy.visibility),
            producer,
            store,
            work_dir: config.work_dir.clone(),
            transform_timeout_secs: transform_timeout.as_secs(),
        }
    }

    /// GIF thumbnail pipeline.
    pub fn thumbnail(
        config: &WorkerConfig,
        store: Arc<dyn BlobStore>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        let producer = ThumbnailProducer::new(ThumbnailExtractor::new(config.thumbnail_timeout));
        Self::new(
            PipelinePolicy::thumbnail(),
            config,
            store,
            probe,
            Arc::new(producer),
        )
    }

    /// WebVTT caption pipeline sharing `models` across invocations.
    pub fn captions(
        config: &WorkerConfig,
        store: Arc<dyn BlobStore>,
        probe: Arc<dyn MediaProbe>,
        models: Arc<ModelCache>,
    ) -> Self {
        let transcriber = Transcriber::new(
            models,
            config.transcribe_options(),
            config.transcribe_timeout,
        );
        Self::new(
            PipelinePolicy::captions(),
            config,
            store,
            probe,
            Arc::new(CaptionProducer::new(transcriber)),
        )
    }

    pub fn kind(&self) -> ArtifactKind {
        self.policy.kind
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    /// Handle one upload event.
    ///
    /// Skips, rejections and empty results are `Ok`. Storage errors always
    /// propagate; transform failures propagate only under
    /// [`FailurePolicy::FailInvocation`].
    pub async fn handle(&self, event: &UploadEvent) -> WorkerResult<InvocationOutcome> {
        let logger = InvocationLogger::new(self.policy.kind, event.key());
        let span = logger.create_span();

        let result = self.run(event, &logger).instrument(span).await;

        let label = match &result {
            Ok(outcome) => {
                logger.log_completion(outcome.label());
                outcome.label()
            }
            Err(e) => {
                logger.log_error(&format!("Invocation failed: {}", e));
                "error"
            }
        };
        metrics::record_invocation(self.policy.kind, label);
        result
    }

    async fn run(
        &self,
        event: &UploadEvent,
        logger: &InvocationLogger,
    ) -> WorkerResult<InvocationOutcome> {
        logger.log_start(&format!("{} ({:.2} MB)", event.key(), event.size_mb()));

        if let ValidationOutcome::Skipped(reason) = self.filter.evaluate(event) {
            return Ok(InvocationOutcome::Skipped { reason });
        }

        if let ValidationOutcome::Rejected(reason) = self.validator.check_size(event) {
            return Ok(InvocationOutcome::Rejected { reason });
        }

        let target = self.guard.target_key(event.key());
        if let ValidationOutcome::Skipped(reason) =
            self.guard.check(event.bucket(), &target).await?
        {
            return Ok(InvocationOutcome::Skipped { reason });
        }

        let scratch = ScratchSpace::create(&self.work_dir)?;
        let result = self.process(event, &target, &scratch, logger).await;
        scratch.close();
        result
    }

    async fn process(
        &self,
        event: &UploadEvent,
        target: &DerivedArtifactKey,
        scratch: &ScratchSpace,
        logger: &InvocationLogger,
    ) -> WorkerResult<InvocationOutcome> {
        let extension = event.extension().unwrap_or_else(|| "bin".to_string());
        let source = scratch.file(&format!("source.{}", extension));

        let downloaded = self
            .store
            .download_to_file(event.bucket(), event.key(), &source)
            .await?;
        logger.log_progress(&format!("Downloaded {} bytes", downloaded));

        if let ValidationOutcome::Rejected(reason) = self.validator.check_duration(&source).await {
            return Ok(InvocationOutcome::Rejected { reason });
        }

        let started = Instant::now();
        let result = self.producer.produce(&source, scratch.path()).await;
        metrics::record_transform(
            self.policy.kind,
            result.label(),
            started.elapsed().as_secs_f64(),
        );

        let artifact = match result {
            TransformResult::Success(Some(artifact)) => artifact,
            TransformResult::Success(None) => {
                logger.log_warning("No content produced, nothing to publish");
                return Ok(InvocationOutcome::NoContent);
            }
            TransformResult::Failed(diagnostic) => {
                return self.transform_failure(logger, Some(diagnostic));
            }
            TransformResult::TimedOut => return self.transform_failure(logger, None),
        };

        if artifact.byte_len().await == 0 {
            return self.transform_failure(logger, Some("produced an empty artifact".to_string()));
        }

        self.publish(event, target, artifact).await
    }

    async fn publish(
        &self,
        event: &UploadEvent,
        target: &DerivedArtifactKey,
        artifact: Artifact,
    ) -> WorkerResult<InvocationOutcome> {
        // A concurrent invocation may have published while we transformed.
        if let ValidationOutcome::Skipped(reason) =
            self.guard.check(event.bucket(), target).await?
        {
            return Ok(InvocationOutcome::Skipped { reason });
        }

        let publication = self.publisher.publish(event.bucket(), target, artifact).await?;
        metrics::record_published(self.policy.kind);

        Ok(InvocationOutcome::Published {
            key: publication.key,
            bytes: publication.bytes,
            public_url: publication.public_url,
        })
    }

    /// `diagnostic` is `None` for a timeout.
    fn transform_failure(
        &self,
        logger: &InvocationLogger,
        diagnostic: Option<String>,
    ) -> WorkerResult<InvocationOutcome> {
        match &diagnostic {
            Some(d) => logger.log_error(&format!("Transform failed: {}", d)),
            None => logger.log_error(&format!(
                "Transform timed out after {}s",
                self.transform_timeout_secs
            )),
        }

        match (self.policy.on_transform_failure, diagnostic) {
            (FailurePolicy::Skip, Some(diagnostic)) => {
                Ok(InvocationOutcome::TransformFailed { diagnostic })
            }
            (FailurePolicy::Skip, None) => Ok(InvocationOutcome::TimedOut),
            (FailurePolicy::FailInvocation, Some(diagnostic)) => {
                Err(WorkerError::transform_failed(self.policy.kind, diagnostic))
            }
            (FailurePolicy::FailInvocation, None) => Err(WorkerError::TransformTimedOut {
                pipeline: self.policy.kind,
                timeout_secs: self.transform_timeout_secs,
            }),
        }
    }
}
