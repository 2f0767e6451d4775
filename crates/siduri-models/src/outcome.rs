//! Eligibility outcomes for an upload event.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an event was skipped as not a candidate for processing.
///
/// Skips are normal terminations, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Object key is outside the watched prefix.
    WrongLocation,
    /// Object key has no accepted source extension (or is itself an artifact).
    WrongExtension,
    /// The derived artifact is already in the store.
    AlreadyExists,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::WrongLocation => "wrong-location",
            SkipReason::WrongExtension => "wrong-extension",
            SkipReason::AlreadyExists => "already-exists",
        }
    }
}

/// Why an eligible-looking event failed policy validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum RejectReason {
    /// Declared size is above the configured ceiling.
    Oversized { size_mb: f64, limit_mb: u64 },
    /// The metadata probe failed or produced no usable duration.
    DurationUnknown,
    /// Probed duration is above the configured ceiling.
    DurationExceedsLimit { duration_secs: f64, limit_secs: u64 },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Oversized { .. } => "oversized",
            RejectReason::DurationUnknown => "duration-unknown",
            RejectReason::DurationExceedsLimit { .. } => "duration-exceeds-limit",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Oversized { size_mb, limit_mb } => {
                write!(f, "oversized: {:.1}MB > {}MB limit", size_mb, limit_mb)
            }
            RejectReason::DurationUnknown => f.write_str("duration-unknown"),
            RejectReason::DurationExceedsLimit {
                duration_secs,
                limit_secs,
            } => write!(
                f,
                "duration-exceeds-limit: {:.0}s > {}s limit",
                duration_secs, limit_secs
            ),
        }
    }
}

/// Result of running an eligibility gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Eligible,
    Skipped(SkipReason),
    Rejected(RejectReason),
}

impl ValidationOutcome {
    pub fn is_eligible(&self) -> bool {
        matches!(self, ValidationOutcome::Eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(SkipReason::AlreadyExists.code(), "already-exists");
        assert_eq!(RejectReason::DurationUnknown.code(), "duration-unknown");
        assert_eq!(
            RejectReason::Oversized {
                size_mb: 501.0,
                limit_mb: 500
            }
            .to_string(),
            "oversized: 501.0MB > 500MB limit"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&ValidationOutcome::Skipped(SkipReason::WrongLocation))
            .unwrap();
        assert_eq!(json, r#"{"outcome":"skipped","detail":"wrong-location"}"#);
        assert!(ValidationOutcome::Eligible.is_eligible());
    }
}
