//! Transcribe a local video to `<stem>.vtt` without touching storage.
//!
//! Usage: `siduri-transcribe-local <video>`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use siduri_media::{ModelCache, Transcriber, WhisperCliLoader};
use siduri_models::{format_vtt, format_vtt_timestamp, TransformResult};
use siduri_worker::{ScratchSpace, WorkerConfig};

const PREVIEW_CUES: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    siduri_worker::init_tracing();

    let video = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: siduri-transcribe-local <video>")?;
    if !video.exists() {
        anyhow::bail!("file not found: {}", video.display());
    }

    let config = WorkerConfig::from_env();
    config.validate()?;

    let loader = WhisperCliLoader::new(config.whisper_cli_config());
    let models = Arc::new(ModelCache::new(Arc::new(loader)));
    let transcriber =
        Transcriber::new(models, config.transcribe_options(), config.transcribe_timeout);

    println!(
        "Transcribing {} (language: {}, model: {})",
        video.display(),
        config.language,
        config.model_variant
    );

    let scratch = ScratchSpace::create(&config.work_dir)?;
    let result = transcriber.transcribe(&video, scratch.path()).await;
    scratch.close();

    let transcript = match result {
        TransformResult::Success(transcript) => transcript,
        TransformResult::Failed(diagnostic) => {
            anyhow::bail!("transcription failed: {}", diagnostic)
        }
        TransformResult::TimedOut => anyhow::bail!(
            "transcription timed out after {}s",
            config.transcribe_timeout.as_secs()
        ),
    };

    let Some(vtt) = format_vtt(&transcript.segments) else {
        println!("No speech detected");
        return Ok(());
    };

    let output = vtt_path(&video);
    tokio::fs::write(&output, vtt)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Wrote {} cues to {}",
        transcript.segments.len(),
        output.display()
    );
    for segment in transcript.segments.iter().take(PREVIEW_CUES) {
        println!(
            "  {} --> {}  {}",
            format_vtt_timestamp(segment.start),
            format_vtt_timestamp(segment.end),
            segment.text.trim()
        );
    }
    if transcript.segments.len() > PREVIEW_CUES {
        println!("  ... ({} more)", transcript.segments.len() - PREVIEW_CUES);
    }

    Ok(())
}

/// `clip.mp4` → `clip.vtt`, next to the input.
fn vtt_path(video: &Path) -> PathBuf {
    video.with_extension("vtt")
}
