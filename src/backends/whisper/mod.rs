//! In-process [`TranscriptionEngine`] powered by `whisper-rs` / `whisper.cpp`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use whisper_rs::WhisperContext;

use crate::cancel::CancelToken;
use crate::engine::{TranscribeRequest, TranscriptionEngine};
use crate::media::TARGET_SAMPLE_RATE;
use crate::segments::{Transcript, UNDETERMINED_LANGUAGE};
use crate::wav::get_samples_from_wav_reader;
use crate::{Error, Result};

mod ctx;
mod logging;
mod segments;

/// Loads each model once and shares the context across workers.
#[derive(Default)]
pub struct WhisperEngine {
    contexts: Mutex<HashMap<PathBuf, Arc<WhisperContext>>>,
}

impl WhisperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self, model_path: &std::path::Path) -> Result<Arc<WhisperContext>> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|_| Error::Transcription("whisper context cache poisoned".into()))?;

        if let Some(ctx) = contexts.get(model_path) {
            return Ok(ctx.clone());
        }

        info!(model = %model_path.display(), "loading whisper model");
        let ctx = Arc::new(ctx::get_context(model_path)?);
        contexts.insert(model_path.to_path_buf(), ctx.clone());
        Ok(ctx)
    }
}

impl TranscriptionEngine for WhisperEngine {
    fn transcribe(&self, req: &TranscribeRequest<'_>, cancel: &CancelToken) -> Result<Transcript> {
        cancel.check()?;

        let ctx = self.context(req.model_path)?;
        let reader = BufReader::new(File::open(req.audio_path)?);
        let (samples, _spec) = get_samples_from_wav_reader(reader)?;
        let source_duration_ms = samples.len() as u64 * 1000 / u64::from(TARGET_SAMPLE_RATE);

        cancel.check()?;
        let segments = if samples.is_empty() {
            Vec::new()
        } else {
            segments::transcribe_samples(&ctx, req.opts, &samples)?
        };
        debug!(segments = segments.len(), "whisper pass finished");

        let language = req
            .opts
            .language
            .clone()
            .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_owned());
        Ok(Transcript::new(language, segments).with_source_duration_ms(source_duration_ms))
    }
}
