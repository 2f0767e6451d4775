//! Outcome of one external transformation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tagged result of an external transform driver.
///
/// Drivers never surface tool failures as errors: a non-zero exit or a
/// library failure becomes [`TransformResult::Failed`] carrying the captured
/// diagnostic, and budget exhaustion becomes [`TransformResult::TimedOut`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum TransformResult<T> {
    Success(T),
    Failed(String),
    TimedOut,
}

impl<T> TransformResult<T> {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self::Failed(diagnostic.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransformResult::Success(_))
    }

    /// Map the success payload, keeping failure and timeout as they are.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> TransformResult<U> {
        match self {
            TransformResult::Success(v) => TransformResult::Success(f(v)),
            TransformResult::Failed(d) => TransformResult::Failed(d),
            TransformResult::TimedOut => TransformResult::TimedOut,
        }
    }

    /// Chain another fallible step onto a success.
    pub fn and_then<U, F: FnOnce(T) -> TransformResult<U>>(self, f: F) -> TransformResult<U> {
        match self {
            TransformResult::Success(v) => f(v),
            TransformResult::Failed(d) => TransformResult::Failed(d),
            TransformResult::TimedOut => TransformResult::TimedOut,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TransformResult::Success(_) => "success",
            TransformResult::Failed(_) => "failed",
            TransformResult::TimedOut => "timed_out",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_chain() {
        let ok: TransformResult<u32> = TransformResult::Success(2);
        assert_eq!(ok.map(|v| v * 2), TransformResult::Success(4));

        let failed: TransformResult<u32> = TransformResult::failed("boom");
        assert_eq!(
            failed.and_then(|v| TransformResult::Success(v + 1)),
            TransformResult::Failed("boom".to_string())
        );

        let timed_out: TransformResult<u32> = TransformResult::TimedOut;
        assert_eq!(timed_out.label(), "timed_out");
    }
}
