//! FFprobe duration probe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use siduri_models::policy::DEFAULT_PROBE_TIMEOUT_SECS;

use crate::command::{CommandRunner, ExternalCommand};
use crate::error::{MediaError, MediaResult};

/// Reads media metadata from a local file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration of the media in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// FFprobe JSON output format (only the fields we read).
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<serde_json::Value>,
}

/// [`MediaProbe`] backed by the `ffprobe` CLI with a hard budget.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    timeout: Duration,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
    }
}

impl FfprobeProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build the ffprobe invocation for `path`.
    pub fn build_command(path: &Path) -> ExternalCommand {
        ExternalCommand::new("ffprobe")
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .path_arg(path)
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let output = CommandRunner::new()
            .with_timeout(self.timeout)
            .try_run(&Self::build_command(path))
            .await?;

        let duration = parse_duration(&output.stdout)?;
        debug!(path = %path.display(), duration, "Probed media duration");
        Ok(duration)
    }
}

/// Extract `format.duration` from ffprobe JSON output.
///
/// FFprobe prints the duration as a string; a bare number is accepted too.
/// A missing, non-numeric, negative or non-finite duration is an error.
pub fn parse_duration(stdout: &[u8]) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let raw = probe
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| MediaError::invalid_output("ffprobe reported no duration"))?;

    let duration = match &raw {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| MediaError::invalid_output(format!("unparsable duration: {}", raw)))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(MediaError::invalid_output(format!(
            "invalid duration: {}",
            duration
        )));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_string() {
        let json = br#"{"format": {"duration": "12.345000"}}"#;
        assert!((parse_duration(json).unwrap() - 12.345).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_number() {
        let json = br#"{"format": {"duration": 600}}"#;
        assert_eq!(parse_duration(json).unwrap(), 600.0);
    }

    #[test]
    fn test_parse_duration_failures() {
        assert!(parse_duration(b"").is_err());
        assert!(parse_duration(b"garbage").is_err());
        assert!(parse_duration(br#"{"format": {}}"#).is_err());
        assert!(parse_duration(br#"{}"#).is_err());
        assert!(parse_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_duration(br#"{"format": {"duration": "-1"}}"#).is_err());
    }

    #[test]
    fn test_probe_command_shape() {
        let cmd = FfprobeProbe::build_command(Path::new("/tmp/in.mp4"));
        assert_eq!(cmd.program(), "ffprobe");
        assert_eq!(cmd.get_args().last().unwrap(), "/tmp/in.mp4");
        assert!(cmd.get_args().contains(&"format=duration".to_string()));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = FfprobeProbe::default()
            .duration(Path::new("/nonexistent/siduri/video.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
