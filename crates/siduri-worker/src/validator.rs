//! Size and duration gates.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use siduri_media::MediaProbe;
use siduri_models::{RejectReason, UploadEvent, ValidationOutcome, BYTES_PER_MB};

/// Enforces the size and duration ceilings.
///
/// Both ceilings are inclusive: a value exactly at the limit is eligible.
#[derive(Clone)]
pub struct EligibilityValidator {
    max_file_size_mb: u64,
    max_duration_secs: u64,
    probe: Arc<dyn MediaProbe>,
}

impl EligibilityValidator {
    pub fn new(max_file_size_mb: u64, max_duration_secs: u64, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            max_file_size_mb,
            max_duration_secs,
            probe,
        }
    }

    /// Gate on the declared size. Runs before any download.
    pub fn check_size(&self, event: &UploadEvent) -> ValidationOutcome {
        let limit_bytes = self.max_file_size_mb.saturating_mul(BYTES_PER_MB);
        if event.size_bytes() > limit_bytes {
            let reason = RejectReason::Oversized {
                size_mb: event.size_mb(),
                limit_mb: self.max_file_size_mb,
            };
            warn!(key = event.key(), "Rejected: {}", reason);
            return ValidationOutcome::Rejected(reason);
        }
        ValidationOutcome::Eligible
    }

    /// Gate on the probed duration of the downloaded file.
    ///
    /// A failed probe rejects the video: an unknown duration is never
    /// treated as zero.
    pub async fn check_duration(&self, path: &Path) -> ValidationOutcome {
        let duration = match self.probe.duration(path).await {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), "Rejected: could not probe duration: {}", e);
                return ValidationOutcome::Rejected(RejectReason::DurationUnknown);
            }
        };

        if duration > self.max_duration_secs as f64 {
            let reason = RejectReason::DurationExceedsLimit {
                duration_secs: duration,
                limit_secs: self.max_duration_secs,
            };
            warn!("Rejected: {}", reason);
            return ValidationOutcome::Rejected(reason);
        }

        info!("Video duration: {:.1}s", duration);
        ValidationOutcome::Eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use siduri_media::{MediaError, MediaResult};

    struct FixedProbe(Option<f64>);

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            self.0.ok_or_else(|| MediaError::invalid_output("no duration"))
        }
    }

    fn validator(duration: Option<f64>) -> EligibilityValidator {
        EligibilityValidator::new(500, 600, Arc::new(FixedProbe(duration)))
    }

    #[test]
    fn test_size_boundary() {
        let v = validator(None);
        let at_limit = UploadEvent::new("b", "videos/a.mp4", 500 * BYTES_PER_MB);
        let over = UploadEvent::new("b", "videos/a.mp4", 500 * BYTES_PER_MB + 1);

        assert!(v.check_size(&at_limit).is_eligible());
        match v.check_size(&over) {
            ValidationOutcome::Rejected(RejectReason::Oversized { limit_mb, .. }) => {
                assert_eq!(limit_mb, 500)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duration_boundary() {
        let path = Path::new("/tmp/source.mp4");
        assert!(validator(Some(600.0)).check_duration(path).await.is_eligible());
        assert!(matches!(
            validator(Some(600.5)).check_duration(path).await,
            ValidationOutcome::Rejected(RejectReason::DurationExceedsLimit { .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_failure_rejects() {
        assert_eq!(
            validator(None).check_duration(Path::new("/tmp/x.mp4")).await,
            ValidationOutcome::Rejected(RejectReason::DurationUnknown)
        );
    }
}
