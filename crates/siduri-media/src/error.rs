//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use siduri_models::TransformResult;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving external media tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{program} failed: {message}")]
    CommandFailed {
        program: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {:.1} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unexpected tool output: {0}")]
    InvalidOutput(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a command failure error.
    pub fn command_failed(
        program: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad(message.into())
    }

    /// Diagnostic text for logs, including captured stderr when available.
    pub fn diagnostic(&self) -> String {
        match self {
            MediaError::CommandFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}\n{}", self, stderr.trim_end()),
            _ => self.to_string(),
        }
    }

    /// Fold an error into the tagged transform result.
    ///
    /// Timeouts keep their own tag; everything else becomes `Failed` with
    /// the diagnostic text.
    pub fn into_transform_result<T>(self) -> TransformResult<T> {
        match self {
            MediaError::Timeout(_) => TransformResult::TimedOut,
            other => TransformResult::Failed(other.diagnostic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_timed_out() {
        let result: TransformResult<()> =
            MediaError::Timeout(Duration::from_secs(1)).into_transform_result();
        assert_eq!(result, TransformResult::TimedOut);
    }

    #[test]
    fn test_failure_carries_stderr() {
        let err = MediaError::command_failed(
            "ffmpeg",
            "exited with status 1",
            Some("Invalid data found when processing input\n".to_string()),
            Some(1),
        );
        match err.into_transform_result::<()>() {
            TransformResult::Failed(diag) => {
                assert!(diag.contains("ffmpeg failed: exited with status 1"));
                assert!(diag.contains("Invalid data found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
