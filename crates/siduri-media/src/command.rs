//! External command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use siduri_models::TransformResult;

use crate::error::{MediaError, MediaResult};

/// Maximum stderr kept for diagnostics.
const STDERR_CAPTURE_LIMIT: usize = 64 * 1024;

/// How long to wait for output pipes to close after the child exits when
/// no budget is set, and the floor used when the budget is nearly spent.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);
const MIN_PIPE_DRAIN: Duration = Duration::from_millis(200);

/// An executable plus its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a path argument.
    pub fn path_arg(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().to_string();
        self.arg(path)
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Command line for logs.
    pub fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs external commands under an optional wall-clock budget and
/// cancellation signal.
///
/// On budget exhaustion or cancellation the child is killed before the
/// runner returns.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Hard wall-clock budget
    timeout: Option<Duration>,
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Expired(Duration),
    Cancelled,
}

impl CommandRunner {
    /// Create a new runner without budget or cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run a command and fold the outcome into a [`TransformResult`].
    pub async fn run(&self, cmd: &ExternalCommand) -> TransformResult<CommandOutput> {
        match self.try_run(cmd).await {
            Ok(output) => TransformResult::Success(output),
            Err(e) => e.into_transform_result(),
        }
    }

    /// Run a command, returning an error for non-zero exit, timeout,
    /// cancellation or spawn failure.
    pub async fn try_run(&self, cmd: &ExternalCommand) -> MediaResult<CommandOutput> {
        debug!("Running: {}", cmd.display());
        let started = Instant::now();

        let mut child = Command::new(cmd.program())
            .args(cmd.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::ToolNotFound(cmd.program().to_string())
                } else {
                    MediaError::Io(e)
                }
            })?;

        let stdout_handle = child.stdout.take().map(|s| spawn_reader(s, usize::MAX));
        let stderr_handle = child
            .stderr
            .take()
            .map(|s| spawn_reader(s, STDERR_CAPTURE_LIMIT));

        let outcome = {
            let wait = child.wait();
            let deadline = sleep_or_forever(self.timeout);
            let cancelled = wait_for_cancel(self.cancel_rx.clone());
            tokio::select! {
                status = wait => WaitOutcome::Exited(status),
                expired = deadline => WaitOutcome::Expired(expired),
                _ = cancelled => WaitOutcome::Cancelled,
            }
        };

        let status = match outcome {
            WaitOutcome::Exited(status) => status?,
            WaitOutcome::Expired(budget) => {
                warn!(
                    "{} timed out after {:.1}s, killing process",
                    cmd.program(),
                    budget.as_secs_f64()
                );
                let _ = child.kill().await;
                abort_reader(stdout_handle);
                abort_reader(stderr_handle);
                return Err(MediaError::Timeout(budget));
            }
            WaitOutcome::Cancelled => {
                info!("{} cancelled, killing process", cmd.program());
                let _ = child.kill().await;
                abort_reader(stdout_handle);
                abort_reader(stderr_handle);
                return Err(MediaError::Cancelled);
            }
        };

        // A grandchild can inherit the pipes and keep them open past our exit.
        let drain = match self.timeout {
            Some(budget) => budget.saturating_sub(started.elapsed()).max(MIN_PIPE_DRAIN),
            None => PIPE_DRAIN_GRACE,
        };
        let drain_deadline = tokio::time::Instant::now() + drain;
        let stdout = collect_reader(stdout_handle, drain_deadline, cmd.program()).await;
        let stderr = String::from_utf8_lossy(
            &collect_reader(stderr_handle, drain_deadline, cmd.program()).await,
        )
        .to_string();
        let elapsed = started.elapsed();

        if status.success() {
            debug!(
                "{} finished in {:.2}s",
                cmd.program(),
                elapsed.as_secs_f64()
            );
            Ok(CommandOutput {
                stdout,
                stderr,
                elapsed,
            })
        } else {
            Err(MediaError::command_failed(
                cmd.program(),
                format!("exited with {}", status),
                Some(stderr),
                status.code(),
            ))
        }
    }
}

fn spawn_reader<R>(mut reader: R, limit: usize) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    kept.extend_from_slice(&chunk[..n]);
                    // Keep the tail; the end of stderr holds the actual error.
                    if kept.len() > limit {
                        let excess = kept.len() - limit;
                        kept.drain(..excess);
                    }
                }
            }
        }
        kept
    })
}

async fn collect_reader(
    handle: Option<JoinHandle<Vec<u8>>>,
    deadline: tokio::time::Instant,
    program: &str,
) -> Vec<u8> {
    let Some(mut h) = handle else {
        return Vec::new();
    };
    match tokio::time::timeout_at(deadline, &mut h).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            warn!("{} exited but its output pipes stayed open, giving up on them", program);
            h.abort();
            Vec::new()
        }
    }
}

fn abort_reader(handle: Option<JoinHandle<Vec<u8>>>) {
    if let Some(h) = handle {
        h.abort();
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(budget) => {
            tokio::time::sleep(budget).await;
            budget
        }
        None => std::future::pending().await,
    }
}

async fn wait_for_cancel(cancel_rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel_rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling.
            return std::future::pending().await;
        }
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format_secs(seconds))
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format_secs(seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set the GIF/animated output loop count (0 = forever).
    pub fn loop_count(self, count: i32) -> Self {
        self.output_arg("-loop").output_arg(count.to_string())
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set audio channel count.
    pub fn audio_channels(self, channels: u32) -> Self {
        self.output_arg("-ac").output_arg(channels.to_string())
    }

    /// Set audio sample rate.
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.output_arg("-ar").output_arg(rate.to_string())
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Convert into a runnable command.
    pub fn into_command(self) -> ExternalCommand {
        ExternalCommand::new("ffmpeg").args(self.build_args())
    }
}

/// Seconds as FFmpeg expects them; whole values stay integral (`0`, `3`).
fn format_secs(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{:.3}", seconds)
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg".to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::ToolNotFound("ffprobe".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.gif")
            .seek(0.0)
            .duration(3.0)
            .video_filter("fps=10")
            .loop_count(0);

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert!(ss < input && input < t);
        assert_eq!(args[ss + 1], "0");
        assert_eq!(args[t + 1], "3");
        assert_eq!(args.last().unwrap(), "output.gif");
    }

    #[test]
    fn test_fractional_seconds() {
        assert_eq!(format_secs(1.5), "1.500");
        assert_eq!(format_secs(10.0), "10");
    }

    #[tokio::test]
    async fn test_runner_captures_stdout() {
        let output = CommandRunner::new()
            .try_run(&ExternalCommand::new("echo").arg("hello"))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn test_runner_reports_non_zero_exit() {
        let result = CommandRunner::new()
            .run(&ExternalCommand::new("sh").args(["-c", "echo broken >&2; exit 3"]))
            .await;
        match result {
            TransformResult::Failed(diag) => assert!(diag.contains("broken")),
            other => panic!("unexpected result: {:?}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_runner_missing_tool() {
        let err = CommandRunner::new()
            .try_run(&ExternalCommand::new("siduri-definitely-not-a-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_runner_times_out_hanging_process() {
        let started = Instant::now();
        let result = CommandRunner::new()
            .with_timeout(Duration::from_secs(1))
            .run(&ExternalCommand::new("sleep").arg("30"))
            .await;

        assert_eq!(result.label(), "timed_out");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_runner_does_not_wait_on_inherited_pipes() {
        let runner = CommandRunner::new().with_timeout(Duration::from_secs(2));
        let started = Instant::now();

        let result = runner
            .try_run(&ExternalCommand::new("sh").args(["-c", "sleep 30 & exit 0"]))
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_runner_cancellation() {
        let (tx, rx) = watch::channel(false);
        let runner = CommandRunner::new().with_cancel(rx);

        let handle = tokio::spawn(async move {
            runner
                .try_run(&ExternalCommand::new("sleep").arg("30"))
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(MediaError::Cancelled)));
    }
}
