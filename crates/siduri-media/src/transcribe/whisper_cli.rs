//! whisper.cpp command-line backend.
//!
//! "Loading" resolves the executable and checks that the model files are
//! present; each transcription is one bounded CLI run that writes a JSON
//! document next to the audio file.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use siduri_models::{CaptionSegment, Transcript, TransformResult};

use crate::command::{CommandRunner, ExternalCommand};
use crate::error::{MediaError, MediaResult};
use crate::transcribe::model::{ModelLoader, SpeechModel, TranscribeOptions};

/// Where to find the CLI and its model files.
#[derive(Debug, Clone)]
pub struct WhisperCliConfig {
    /// Executable name or path (`whisper-cli`)
    pub binary: String,
    /// ggml model weights
    pub model_path: PathBuf,
    /// Silero VAD weights; required when VAD is enabled
    pub vad_model_path: Option<PathBuf>,
}

impl WhisperCliConfig {
    /// Conventional file name of a model variant (`small` → `ggml-small.bin`).
    pub fn model_file_name(variant: &str) -> String {
        format!("ggml-{}.bin", variant)
    }
}

/// Loads a [`WhisperCliModel`].
#[derive(Debug, Clone)]
pub struct WhisperCliLoader {
    config: WhisperCliConfig,
}

impl WhisperCliLoader {
    pub fn new(config: WhisperCliConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelLoader for WhisperCliLoader {
    async fn load(&self) -> MediaResult<Arc<dyn SpeechModel>> {
        let binary = which::which(&self.config.binary)
            .map_err(|_| MediaError::ToolNotFound(self.config.binary.clone()))?;

        if !tokio::fs::try_exists(&self.config.model_path).await? {
            return Err(MediaError::model_load(format!(
                "model file not found: {}",
                self.config.model_path.display()
            )));
        }
        if let Some(vad) = &self.config.vad_model_path {
            if !tokio::fs::try_exists(vad).await? {
                return Err(MediaError::model_load(format!(
                    "VAD model file not found: {}",
                    vad.display()
                )));
            }
        }

        let name = self
            .config
            .model_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "whisper".to_string());

        Ok(Arc::new(WhisperCliModel {
            binary,
            model_path: self.config.model_path.clone(),
            vad_model_path: self.config.vad_model_path.clone(),
            name,
        }))
    }
}

/// A whisper.cpp model driven through its CLI.
#[derive(Debug, Clone)]
pub struct WhisperCliModel {
    binary: PathBuf,
    model_path: PathBuf,
    vad_model_path: Option<PathBuf>,
    name: String,
}

impl WhisperCliModel {
    /// Build the CLI invocation. Output lands at `<output_prefix>.json`.
    pub fn build_command(
        &self,
        audio_path: &Path,
        output_prefix: &Path,
        options: &TranscribeOptions,
    ) -> MediaResult<ExternalCommand> {
        let mut cmd = ExternalCommand::new(self.binary.to_string_lossy())
            .arg("-m")
            .path_arg(&self.model_path)
            .arg("-f")
            .path_arg(audio_path)
            .arg("-l")
            .arg(&options.language)
            .arg("-bs")
            .arg(options.beam_size.to_string())
            .arg("-t")
            .arg(options.threads.to_string());

        if options.vad_enabled {
            let vad_model = self.vad_model_path.as_ref().ok_or_else(|| {
                MediaError::model_load("VAD enabled but no VAD model configured")
            })?;
            cmd = cmd
                .arg("--vad")
                .arg("-vm")
                .path_arg(vad_model)
                .arg("--vad-min-silence-duration-ms")
                .arg(options.vad_min_silence_ms.to_string());
        }

        Ok(cmd.arg("-oj").arg("-of").path_arg(output_prefix).arg("-np"))
    }
}

#[async_trait]
impl SpeechModel for WhisperCliModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        options: &TranscribeOptions,
        budget: Duration,
    ) -> TransformResult<Transcript> {
        let output_prefix = audio_path.with_extension("transcript");
        let cmd = match self.build_command(audio_path, &output_prefix, options) {
            Ok(cmd) => cmd,
            Err(e) => return e.into_transform_result(),
        };

        let output = match CommandRunner::new().with_timeout(budget).try_run(&cmd).await {
            Ok(output) => output,
            Err(e) => return e.into_transform_result(),
        };

        let json_path = json_output_path(&output_prefix);
        let document = match tokio::fs::read_to_string(&json_path).await {
            Ok(doc) => doc,
            Err(e) => {
                return TransformResult::failed(format!(
                    "whisper produced no output at {}: {}",
                    json_path.display(),
                    e
                ))
            }
        };

        match parse_whisper_json(&document) {
            Ok(mut transcript) => {
                if let Some((language, probability)) = parse_detected_language(&output.stderr) {
                    transcript.language = Some(language);
                    transcript.language_probability = Some(probability);
                }
                debug!(
                    segments = transcript.segments.len(),
                    elapsed_secs = output.elapsed.as_secs_f64(),
                    "whisper finished"
                );
                TransformResult::Success(transcript)
            }
            Err(e) => e.into_transform_result(),
        }
    }
}

/// whisper appends `.json` to the `-of` prefix.
fn json_output_path(output_prefix: &Path) -> PathBuf {
    let mut path = output_prefix.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

#[derive(Debug, Deserialize)]
struct WhisperDocument {
    #[serde(default)]
    result: Option<WhisperResult>,
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperResult {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: u64,
    to: u64,
}

/// Parse the `-oj` document into a transcript.
///
/// Offsets are milliseconds. Segments whose text is blank after trimming
/// (VAD leftovers) are dropped; order is kept as emitted.
pub fn parse_whisper_json(document: &str) -> MediaResult<Transcript> {
    let doc: WhisperDocument = serde_json::from_str(document)?;

    let segments = doc
        .transcription
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            CaptionSegment::new(
                s.offsets.from as f64 / 1000.0,
                s.offsets.to as f64 / 1000.0,
                s.text,
            )
        })
        .collect();

    Ok(Transcript {
        segments,
        language: doc.result.and_then(|r| r.language),
        language_probability: None,
    })
}

/// Find `auto-detected language: es (p = 0.97)` in whisper's stderr.
pub fn parse_detected_language(stderr: &str) -> Option<(String, f32)> {
    const MARKER: &str = "auto-detected language:";

    let line = stderr.lines().find(|l| l.contains(MARKER))?;
    let rest = line.split(MARKER).nth(1)?.trim();
    let (language, tail) = rest.split_once(char::is_whitespace)?;
    let probability = tail
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split('=')
        .nth(1)?
        .trim()
        .parse::<f32>()
        .ok()?;

    Some((language.to_string(), probability))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "systeminfo": "AVX = 1",
        "model": {"type": "small"},
        "params": {"model": "ggml-small.bin", "language": "es", "translate": false},
        "result": {"language": "es"},
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:01,500"},
             "offsets": {"from": 0, "to": 1500}, "text": " hola"},
            {"timestamps": {"from": "00:00:01,500", "to": "00:00:02,000"},
             "offsets": {"from": 1500, "to": 2000}, "text": "   "},
            {"timestamps": {"from": "00:00:02,000", "to": "00:00:04,250"},
             "offsets": {"from": 2000, "to": 4250}, "text": " ¿qué tal?"}
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let transcript = parse_whisper_json(SAMPLE).unwrap();
        assert_eq!(transcript.language.as_deref(), Some("es"));
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0], CaptionSegment::new(0.0, 1.5, " hola"));
        assert_eq!(transcript.segments[1].end, 4.25);
    }

    #[test]
    fn test_parse_document_without_speech() {
        let transcript =
            parse_whisper_json(r#"{"result": {"language": "es"}, "transcription": []}"#).unwrap();
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_parse_malformed_document() {
        assert!(parse_whisper_json("{").is_err());
    }

    #[test]
    fn test_detected_language() {
        let stderr = "whisper_full_with_state: auto-detected language: es (p = 0.973421)\n";
        let (lang, p) = parse_detected_language(stderr).unwrap();
        assert_eq!(lang, "es");
        assert!((p - 0.9734).abs() < 1e-3);
        assert!(parse_detected_language("nothing here").is_none());
    }

    #[test]
    fn test_command_arguments() {
        let model = WhisperCliModel {
            binary: PathBuf::from("/usr/bin/whisper-cli"),
            model_path: PathBuf::from("/models/ggml-small.bin"),
            vad_model_path: Some(PathBuf::from("/models/ggml-silero-v5.1.2.bin")),
            name: "ggml-small".to_string(),
        };
        let cmd = model
            .build_command(
                Path::new("/tmp/speech.wav"),
                Path::new("/tmp/speech.transcript"),
                &TranscribeOptions::default(),
            )
            .unwrap();
        let args = cmd.get_args();
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert_eq!(args[pos("-l") + 1], "es");
        assert_eq!(args[pos("-bs") + 1], "5");
        assert_eq!(args[pos("--vad-min-silence-duration-ms") + 1], "500");
        assert_eq!(args[pos("-of") + 1], "/tmp/speech.transcript");
        assert!(args.contains(&"-oj".to_string()));
    }

    #[test]
    fn test_json_output_path() {
        assert_eq!(
            json_output_path(Path::new("/tmp/speech.transcript")),
            PathBuf::from("/tmp/speech.transcript.json")
        );
    }

    #[test]
    fn test_vad_requires_model() {
        let model = WhisperCliModel {
            binary: PathBuf::from("whisper-cli"),
            model_path: PathBuf::from("/models/ggml-small.bin"),
            vad_model_path: None,
            name: "ggml-small".to_string(),
        };
        let result = model.build_command(
            Path::new("a.wav"),
            Path::new("a.transcript"),
            &TranscribeOptions::default(),
        );
        assert!(matches!(result, Err(MediaError::ModelLoad(_))));
    }

    #[tokio::test]
    async fn test_loader_reports_missing_model() {
        let loader = WhisperCliLoader::new(WhisperCliConfig {
            binary: "sh".to_string(),
            model_path: PathBuf::from("/nonexistent/ggml-small.bin"),
            vad_model_path: None,
        });
        let err = loader.load().await.err().unwrap();
        assert!(matches!(err, MediaError::ModelLoad(_)));
    }
}
