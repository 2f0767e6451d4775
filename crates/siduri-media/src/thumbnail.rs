//! Animated GIF thumbnail extraction.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use siduri_models::policy::{
    DEFAULT_THUMBNAIL_TIMEOUT_SECS, GIF_FPS, GIF_LOOP_FOREVER, GIF_SCALE_WIDTH, GIF_START_SECS,
    GIF_WINDOW_SECS,
};
use siduri_models::TransformResult;

use crate::command::{CommandRunner, FfmpegCommand};

/// Fixed encoding parameters of the preview.
#[derive(Debug, Clone, PartialEq)]
pub struct GifSettings {
    pub start_secs: f64,
    pub window_secs: f64,
    pub fps: u32,
    pub width: u32,
    pub loop_count: i32,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            start_secs: GIF_START_SECS,
            window_secs: GIF_WINDOW_SECS,
            fps: GIF_FPS,
            width: GIF_SCALE_WIDTH,
            loop_count: GIF_LOOP_FOREVER,
        }
    }
}

impl GifSettings {
    /// Two-pass palette filter chain: resample, scale to fixed width with
    /// proportional height, build a palette from the sampled frames and
    /// re-encode against it.
    pub fn filter_chain(&self) -> String {
        format!(
            "fps={},scale={}:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
            self.fps, self.width
        )
    }
}

/// Produces a short looping GIF from the start of a video.
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    settings: GifSettings,
    timeout: Duration,
}

impl Default for ThumbnailExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_THUMBNAIL_TIMEOUT_SECS))
    }
}

impl ThumbnailExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            settings: GifSettings::default(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the encoder command.
    pub fn build_command(&self, source: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(source, output)
            .seek(self.settings.start_secs)
            .duration(self.settings.window_secs)
            .video_filter(self.settings.filter_chain())
            .loop_count(self.settings.loop_count)
    }

    /// Encode the GIF at `output`.
    ///
    /// A zero exit without an output file (or with an empty one) counts as a
    /// failure so nothing empty is ever published.
    pub async fn extract(&self, source: &Path, output: &Path) -> TransformResult<PathBuf> {
        let cmd = self.build_command(source, output).into_command();
        let runner = CommandRunner::new().with_timeout(self.timeout);

        runner.run(&cmd).await.and_then(|out| {
            match std::fs::metadata(output) {
                Ok(meta) if meta.len() > 0 => {
                    info!(
                        output = %output.display(),
                        bytes = meta.len(),
                        elapsed_secs = out.elapsed.as_secs_f64(),
                        "Generated GIF"
                    );
                    TransformResult::Success(output.to_path_buf())
                }
                Ok(_) => TransformResult::failed("ffmpeg produced an empty GIF"),
                Err(e) => TransformResult::failed(format!("ffmpeg produced no GIF: {}", e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_chain() {
        assert_eq!(
            GifSettings::default().filter_chain(),
            "fps=10,scale=480:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"
        );
    }

    #[test]
    fn test_command_arguments() {
        let args = ThumbnailExtractor::default()
            .build_command(Path::new("/tmp/in.mp4"), Path::new("/tmp/out.gif"))
            .build_args();

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-ss") + 1], "0");
        assert_eq!(args[pos("-t") + 1], "3");
        assert_eq!(args[pos("-loop") + 1], "0");
        assert!(pos("-ss") < pos("-i"));
        assert!(args[pos("-vf") + 1].contains("palettegen"));
        assert_eq!(args.last().unwrap(), "/tmp/out.gif");
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and a sample video"]
    async fn test_extract_real_video() {
        let dir = tempfile::tempdir().unwrap();
        let source = std::env::var("SIDURI_SAMPLE_VIDEO").unwrap();
        let output = dir.path().join("out.gif");
        let result = ThumbnailExtractor::default()
            .extract(Path::new(&source), &output)
            .await;
        assert!(result.is_success());
    }
}
