#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use subtitler::{
    CancelToken, Error, MediaToolkit, ModelResolver, Pipeline, Result, Segment, TranscribeRequest,
    Transcript, TranscriptionEngine,
};

/// Engine that fails for selected stems and otherwise returns two fixed segments.
#[derive(Default)]
pub struct ScriptedEngine {
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn fail_on(&self, stems: &[&str]) {
        let mut failing = self.failing.lock().expect("lock");
        failing.clear();
        failing.extend(stems.iter().map(|s| (*s).to_owned()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Stems transcribed so far, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("lock").clone()
    }
}

impl TranscriptionEngine for ScriptedEngine {
    fn transcribe(&self, req: &TranscribeRequest<'_>, _cancel: &CancelToken) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = req
            .audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.seen.lock().expect("lock").push(stem.clone());

        if self.failing.lock().expect("lock").contains(&stem) {
            return Err(Error::Transcription(format!("exit status 1: bad audio in {stem}")));
        }
        Ok(Transcript::new(
            "en",
            vec![
                Segment::new(0, 1500, format!("{stem} line one")),
                Segment::new(1500, 3000, "line two"),
            ],
        ))
    }
}

/// Writes an empty `{stem}.wav` instead of running a media toolkit.
pub struct StubToolkit;

impl MediaToolkit for StubToolkit {
    fn extract_audio(&self, input: &Path, scratch_dir: &Path, _cancel: &CancelToken) -> Result<PathBuf> {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let wav = scratch_dir.join(format!("{stem}.wav"));
        std::fs::write(&wav, b"")?;
        Ok(wav)
    }

    fn embed_subtitles(
        &self,
        _video: &Path,
        _subtitle: &Path,
        output: &Path,
        _cancel: &CancelToken,
    ) -> Result<PathBuf> {
        Ok(output.to_path_buf())
    }
}

pub struct AnyModel;

impl ModelResolver for AnyModel {
    fn resolve(&self, model_name: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("/models/ggml-{model_name}.bin")))
    }
}

pub fn pipeline(engine: Arc<ScriptedEngine>) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(engine, Arc::new(AnyModel), Arc::new(StubToolkit)))
}

/// Create small media files named `names` inside `dir`.
pub fn media_files(dir: &Path, names: &[&str]) -> anyhow::Result<()> {
    for name in names {
        std::fs::write(dir.join(name), format!("media bytes for {name}"))?;
    }
    Ok(())
}
