//! In-process fakes for the external collaborators, shared by unit tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::engine::{TranscribeRequest, TranscriptionEngine};
use crate::media::MediaToolkit;
use crate::models::ModelResolver;
use crate::pipeline::Pipeline;
use crate::segments::{Segment, Transcript};
use crate::{Error, Result};

/// Returns the same two-segment transcript for every input, except inputs whose stem is listed
/// in `fail_stems`.
#[derive(Default)]
pub(crate) struct CannedEngine {
    pub fail_stems: HashSet<String>,
    pub delay: Duration,
    pub calls: AtomicUsize,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl CannedEngine {
    pub fn failing(stems: &[&str]) -> Self {
        Self {
            fail_stems: stems.iter().map(|s| (*s).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl TranscriptionEngine for CannedEngine {
    fn transcribe(&self, req: &TranscribeRequest<'_>, cancel: &CancelToken) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);
        cancel.check()?;

        let stem = req
            .audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_stems.contains(&stem) {
            return Err(Error::Transcription(format!("engine exploded on {stem}")));
        }

        Ok(Transcript::new(
            "en",
            vec![
                Segment::new(0, 1000, format!("hello from {stem}")),
                Segment::new(1000, 2000, "goodbye"),
            ],
        )
        .with_source_duration_ms(2000))
    }
}

/// "Extracts" audio by creating an empty `{stem}.wav` in the scratch directory.
pub(crate) struct FakeToolkit;

impl MediaToolkit for FakeToolkit {
    fn extract_audio(
        &self,
        input: &Path,
        scratch_dir: &Path,
        _cancel: &CancelToken,
    ) -> Result<PathBuf> {
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

pub(crate) struct AnyModel;

impl ModelResolver for AnyModel {
    fn resolve(&self, model_name: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("/models/ggml-{model_name}.bin")))
    }
}

pub(crate) fn pipeline_with(engine: Arc<CannedEngine>) -> Pipeline {
    Pipeline::new(engine, Arc::new(AnyModel), Arc::new(FakeToolkit))
}

/// Create empty media files named `names` inside `dir`.
pub(crate) fn media_files(dir: &Path, names: &[&str]) -> anyhow::Result<()> {
    for name in names {
        std::fs::write(dir.join(name), name.as_bytes())?;
    }
    Ok(())
}
