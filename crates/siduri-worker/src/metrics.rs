//! Worker metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use metrics::{counter, histogram};

use siduri_models::ArtifactKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const INVOCATIONS_TOTAL: &str = "siduri_invocations_total";
    pub const TRANSFORM_DURATION_SECONDS: &str = "siduri_transform_duration_seconds";
    pub const ARTIFACTS_PUBLISHED_TOTAL: &str = "siduri_artifacts_published_total";
}

/// Record a finished invocation.
pub fn record_invocation(pipeline: ArtifactKind, outcome: &'static str) {
    let labels = [
        ("pipeline", pipeline.as_str().to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::INVOCATIONS_TOTAL, &labels).increment(1);
}

/// Record one transform run.
pub fn record_transform(pipeline: ArtifactKind, result: &'static str, duration_secs: f64) {
    let labels = [
        ("pipeline", pipeline.as_str().to_string()),
        ("result", result.to_string()),
    ];
    histogram!(names::TRANSFORM_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a published artifact.
pub fn record_published(pipeline: ArtifactKind) {
    let labels = [("pipeline", pipeline.as_str().to_string())];
    counter!(names::ARTIFACTS_PUBLISHED_TOTAL, &labels).increment(1);
}
