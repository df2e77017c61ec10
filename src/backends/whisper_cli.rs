//! [`TranscriptionEngine`] that shells out to whisper.cpp's `whisper-cli`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::engine::{TranscribeRequest, TranscriptionEngine};
use crate::process::run_command;
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};
use crate::{Error, Result, wav};

/// Runs `whisper-cli` once per request and parses its JSON output (`-oj`).
#[derive(Debug, Clone)]
pub struct WhisperCliEngine {
    binary: PathBuf,
    grace: Duration,
}

impl WhisperCliEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            grace: Duration::from_secs(5),
        }
    }

    /// How long a cancelled transcription may keep running before it is killed.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, req: &TranscribeRequest<'_>, output_base: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-t")
            .arg(req.opts.threads.max(1).to_string())
            .arg("-m")
            .arg(req.model_path)
            .arg("-f")
            .arg(req.audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(output_base);
        if let Some(language) = req.opts.language.as_deref() {
            cmd.arg("-l").arg(language);
        }
        if req.opts.translate {
            cmd.arg("-tr");
        }
        cmd
    }
}

impl Default for WhisperCliEngine {
    fn default() -> Self {
        Self::new("whisper-cli")
    }
}

impl TranscriptionEngine for WhisperCliEngine {
    fn transcribe(&self, req: &TranscribeRequest<'_>, cancel: &CancelToken) -> Result<Transcript> {
        cancel.check()?;

        let scratch = tempfile::tempdir()?;
        let output_base = scratch.path().join("transcript");

        let out = run_command(&mut self.command(req, &output_base), cancel, self.grace).map_err(
            |e| match e {
                Error::Io(io) => Error::Transcription(format!(
                    "failed to run '{}': {io}",
                    self.binary.display()
                )),
                other => other,
            },
        )?;
        if !out.success() {
            return Err(Error::Transcription(format!(
                "whisper-cli {}",
                out.failure_message()
            )));
        }

        let json_path = output_base.with_extension("json");
        let content = std::fs::read_to_string(&json_path).map_err(|e| {
            Error::Transcription(format!(
                "whisper-cli wrote no output at '{}': {e}",
                json_path.display()
            ))
        })?;

        let mut transcript = parse_whisper_json(&content, req.opts.language.as_deref())?;
        match wav::duration_ms(req.audio_path) {
            Ok(ms) => transcript.source_duration_ms = Some(ms),
            Err(e) => warn!(audio = %req.audio_path.display(), error = %e, "could not read audio duration"),
        }

        debug!(segments = transcript.len(), language = %transcript.language, "whisper-cli finished");
        Ok(transcript)
    }
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    result: Option<WhisperResult>,
    #[serde(default)]
    transcription: Vec<WhisperItem>,
}

#[derive(Debug, Deserialize)]
struct WhisperResult {
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperItem {
    offsets: WhisperOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: u64,
    to: u64,
}

/// Parse whisper.cpp's `-oj` document. Text is trimmed and empty segments are dropped.
fn parse_whisper_json(content: &str, language_hint: Option<&str>) -> Result<Transcript> {
    let output: WhisperOutput = serde_json::from_str(content)
        .map_err(|e| Error::Transcription(format!("unparsable whisper-cli output: {e}")))?;

    let language = output
        .result
        .and_then(|r| r.language)
        .filter(|l| !l.trim().is_empty())
        .or_else(|| language_hint.map(str::to_owned))
        .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_owned());

    let segments = output
        .transcription
        .into_iter()
        .filter_map(|item| {
            let text = item.text.trim();
            (!text.is_empty()).then(|| Segment::new(item.offsets.from, item.offsets.to, text))
        })
        .collect();

    Ok(Transcript::new(language, segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TranscribeOpts;

    const SAMPLE: &str = r#"{
        "systeminfo": "AVX = 1",
        "model": {"type": "base"},
        "params": {"model": "models/ggml-base.bin", "language": "auto", "translate": false},
        "result": {"language": "en"},
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:01,200"}, "offsets": {"from": 0, "to": 1200}, "text": " Hello there."},
            {"timestamps": {"from": "00:00:01,200", "to": "00:00:01,300"}, "offsets": {"from": 1200, "to": 1300}, "text": "  "},
            {"timestamps": {"from": "00:00:01,300", "to": "00:00:02,500"}, "offsets": {"from": 1300, "to": 2500}, "text": " General Kenobi."}
        ]
    }"#;

    #[test]
    fn parses_offsets_language_and_drops_blank_text() -> anyhow::Result<()> {
        let t = parse_whisper_json(SAMPLE, None)?;
        assert_eq!(t.language, "en");
        assert_eq!(
            t.segments,
            vec![
                Segment::new(0, 1200, "Hello there."),
                Segment::new(1300, 2500, "General Kenobi."),
            ]
        );
        Ok(())
    }

    #[test]
    fn language_falls_back_to_hint_then_und() -> anyhow::Result<()> {
        let doc = r#"{"transcription": []}"#;
        assert_eq!(parse_whisper_json(doc, Some("de"))?.language, "de");
        assert_eq!(parse_whisper_json(doc, None)?.language, UNDETERMINED_LANGUAGE);
        Ok(())
    }

    #[test]
    fn garbage_output_is_a_transcription_error() {
        let err = parse_whisper_json("not json", None).unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }

    #[test]
    fn command_line_carries_model_threads_and_options() {
        let opts = TranscribeOpts {
            threads: 3,
            language: Some("fr".into()),
            translate: true,
        };
        let req = TranscribeRequest {
            audio_path: Path::new("/tmp/a.wav"),
            model_path: Path::new("/models/ggml-base.bin"),
            opts: &opts,
        };
        let cmd = WhisperCliEngine::new("whisper-cli").command(&req, Path::new("/tmp/out"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-t",
                "3",
                "-m",
                "/models/ggml-base.bin",
                "-f",
                "/tmp/a.wav",
                "-oj",
                "-of",
                "/tmp/out",
                "-l",
                "fr",
                "-tr"
            ]
        );
    }

    #[test]
    fn missing_binary_is_a_transcription_error() {
        let opts = TranscribeOpts::default();
        let req = TranscribeRequest {
            audio_path: Path::new("/tmp/a.wav"),
            model_path: Path::new("/models/ggml-base.bin"),
            opts: &opts,
        };
        let err = WhisperCliEngine::new("/nonexistent/whisper-cli")
            .transcribe(&req, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
    }
}
