//! Upload event worker binary.
//!
//! Usage: `siduri-worker <thumbnail|captions>`
//!
//! Reads one JSON upload event per line from stdin and writes one JSON
//! result per line to stdout. Failed invocations are reported on their
//! result line; the exit code only reflects startup failures.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use siduri_media::{FfprobeProbe, ModelCache, WhisperCliLoader};
use siduri_models::{ArtifactKind, UploadEvent};
use siduri_storage::BucketClient;
use siduri_worker::{Pipeline, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    siduri_worker::init_tracing();

    let kind: ArtifactKind = match std::env::args().nth(1).map(|a| a.parse::<ArtifactKind>()) {
        Some(Ok(kind)) => kind,
        Some(Err(e)) => {
            error!("{}", e);
            std::process::exit(2);
        }
        None => {
            eprintln!("usage: siduri-worker <thumbnail|captions>");
            std::process::exit(2);
        }
    };

    info!("Starting siduri-worker ({} pipeline)", kind);

    let config = WorkerConfig::from_env();
    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Worker config: {:?}", config);

    let store = match BucketClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };
    let probe = Arc::new(FfprobeProbe::new(config.probe_timeout));

    let pipeline = match kind {
        ArtifactKind::Thumbnail => Pipeline::thumbnail(&config, store, probe),
        ArtifactKind::Captions => {
            let loader = WhisperCliLoader::new(config.whisper_cli_config());
            let models = Arc::new(ModelCache::new(Arc::new(loader)));
            Pipeline::captions(&config, store, probe, models)
        }
    };

    let failures = run(
        pipeline,
        &config,
        tokio::io::stdin(),
        tokio::io::stdout(),
        tokio::signal::ctrl_c(),
    )
    .await;
    if failures > 0 {
        warn!("{} invocation(s) failed", failures);
    }
    info!("Worker shutdown complete");
}

/// Process events until EOF or `shutdown`. Returns the number of failed invocations.
///
/// In-flight invocations always finish; an event still waiting for a slot
/// when `shutdown` resolves is dropped.
async fn run<R, W, S>(
    pipeline: Pipeline,
    config: &WorkerConfig,
    input: R,
    mut output: W,
    shutdown: S,
) -> usize
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future,
{
    let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<serde_json::Value>();

    let writer = tokio::spawn(async move {
        while let Some(line) = results_rx.recv().await {
            let mut bytes = line.to_string().into_bytes();
            bytes.push(b'\n');
            if output.write_all(&bytes).await.is_err() {
                break;
            }
            output.flush().await.ok();
        }
    });

    let mut lines = BufReader::new(input).lines();
    let mut tasks = JoinSet::new();

    // One listener for the whole loop so a signal between selects is not lost.
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = &mut shutdown => {
                info!("Received shutdown signal, draining in-flight invocations");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read event: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match UploadEvent::from_json(&line, config.bucket.as_deref()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring malformed event: {}", e);
                results_tx
                    .send(json!({"status": "invalid_event", "error": e.to_string()}))
                    .ok();
                continue;
            }
        };

        let permit = tokio::select! {
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = &mut shutdown => {
                info!(
                    "Received shutdown signal while waiting for a slot, dropping {}",
                    event.key()
                );
                break;
            }
        };
        let pipeline = pipeline.clone();
        let results_tx = results_tx.clone();

        tasks.spawn(async move {
            let _permit = permit;
            let result = pipeline.handle(&event).await;
            let failed = result.is_err();
            let line = match result {
                Ok(outcome) => json!({"key": event.key(), "outcome": outcome}),
                Err(e) => json!({
                    "key": event.key(),
                    "status": "error",
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                }),
            };
            results_tx.send(line).ok();
            failed
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => failures += 1,
            Ok(false) => {}
            Err(e) => {
                error!("Invocation task panicked: {}", e);
                failures += 1;
            }
        }
    }

    drop(results_tx);
    writer.await.ok();
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use siduri_media::{MediaProbe, MediaResult};
    use siduri_models::TransformResult;
    use siduri_storage::MemoryStore;
    use siduri_worker::{Artifact, ArtifactProducer, PipelinePolicy};

    struct FiveSeconds;

    #[async_trait]
    impl MediaProbe for FiveSeconds {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            Ok(5.0)
        }
    }

    /// Holds its slot for a while before producing a GIF.
    struct SlowProducer(Duration);

    #[async_trait]
    impl ArtifactProducer for SlowProducer {
        fn kind(&self) -> ArtifactKind {
            ArtifactKind::Thumbnail
        }

        async fn produce(
            &self,
            _source: &Path,
            _scratch_dir: &Path,
        ) -> TransformResult<Option<Artifact>> {
            tokio::time::sleep(self.0).await;
            TransformResult::Success(Some(Artifact::bytes(
                b"GIF89a".to_vec(),
                ArtifactKind::Thumbnail,
            )))
        }
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_a_slot() {
        let root = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            work_dir: root.path().join("work"),
            max_concurrent_jobs: 1,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new());
        store.put("media", "videos/a.mp4", b"video".to_vec(), "video/mp4");
        store.put("media", "videos/b.mp4", b"video".to_vec(), "video/mp4");
        let pipeline = Pipeline::new(
            PipelinePolicy::thumbnail(),
            &config,
            store.clone(),
            Arc::new(FiveSeconds),
            Arc::new(SlowProducer(Duration::from_millis(500))),
        );

        // The second event blocks on the only slot; the reader stays open.
        let (mut events, input) = tokio::io::duplex(4096);
        for name in ["videos/a.mp4", "videos/b.mp4"] {
            let line = json!({"bucket": "media", "name": name, "size": 1}).to_string() + "\n";
            events.write_all(line.as_bytes()).await.unwrap();
        }
        let (output, mut results) = tokio::io::duplex(4096);

        let started = Instant::now();
        let failures = tokio::time::timeout(
            Duration::from_secs(5),
            run(
                pipeline,
                &config,
                input,
                output,
                tokio::time::sleep(Duration::from_millis(100)),
            ),
        )
        .await
        .expect("shutdown must not wait for stdin to close");

        assert_eq!(failures, 0);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(store.get("media", "videos/a.gif").is_some());
        assert!(store.get("media", "videos/b.gif").is_none());

        drop(events);
        let mut written = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut results, &mut written)
            .await
            .unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("videos/a.mp4"));
    }
}
