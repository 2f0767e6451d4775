//! Startup check for a worker container.
//!
//! Usage: `worker-selfcheck [captions]`

use std::path::Path;

use siduri_media::{check_ffmpeg, check_ffprobe, WhisperCliConfig};
use siduri_storage::BucketClient;
use siduri_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let captions = std::env::args().nth(1).as_deref() == Some("captions");
    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    ensure_env_present(&["STORAGE_ACCESS_KEY_ID", "STORAGE_SECRET_ACCESS_KEY"])?;

    if let Some(bucket) = &config.bucket {
        BucketClient::from_env()?.check_connectivity(bucket).await?;
        println!("worker-selfcheck: bucket {} reachable", bucket);
    }

    let missing = missing_captions_backend(&config.whisper_cli_config());
    if !missing.is_empty() {
        let message = format!("captions backend unavailable ({})", missing.join(", "));
        if captions {
            return Err(anyhow::anyhow!(message));
        }
        println!("worker-selfcheck: warning: {}", message);
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let marker = path.join(format!(".selfcheck-{}", uuid::Uuid::new_v4()));
    tokio::fs::write(&marker, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

/// Speech CLI binary and weight files that cannot be found.
fn missing_captions_backend(whisper: &WhisperCliConfig) -> Vec<String> {
    let mut missing = Vec::new();
    if which::which(&whisper.binary).is_err() {
        missing.push(whisper.binary.clone());
    }
    let weights = std::iter::once(&whisper.model_path).chain(whisper.vad_model_path.as_ref());
    for path in weights {
        if !path.exists() {
            missing.push(path.display().to_string());
        }
    }
    missing
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workdir_is_created_and_left_empty() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("nested/work");

        ensure_workdir(&work_dir).await.unwrap();

        assert!(work_dir.is_dir());
        assert_eq!(std::fs::read_dir(&work_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_workdir_under_a_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(ensure_workdir(blocker.join("work")).await.is_err());
    }

    #[test]
    fn test_missing_vad_weights_reported() {
        let root = tempfile::tempdir().unwrap();
        let model = root.path().join("ggml-small.bin");
        std::fs::write(&model, b"weights").unwrap();
        let vad = root.path().join("ggml-silero-v5.1.2.bin");

        let whisper = WhisperCliConfig {
            binary: "sh".to_string(),
            model_path: model.clone(),
            vad_model_path: Some(vad.clone()),
        };
        assert_eq!(missing_captions_backend(&whisper), vec![vad.display().to_string()]);

        std::fs::write(&vad, b"weights").unwrap();
        assert!(missing_captions_backend(&whisper).is_empty());
    }
}
