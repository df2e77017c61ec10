use std::path::Path;

use crate::Result;
use crate::cancel::CancelToken;
use crate::segments::Transcript;

/// Engine-facing knobs that stay the same for every job in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscribeOpts {
    /// Worker threads handed to the engine for a single transcription.
    pub threads: usize,
    /// Spoken language hint; `None` lets the engine detect it.
    pub language: Option<String>,
    /// Translate to English instead of transcribing.
    pub translate: bool,
}

impl Default for TranscribeOpts {
    fn default() -> Self {
        Self {
            threads: default_thread_count(),
            language: None,
            translate: false,
        }
    }
}

/// Logical CPUs, capped at 8.
pub fn default_thread_count() -> usize {
    num_cpus::get().clamp(1, 8)
}

/// One transcription invocation.
#[derive(Debug, Clone, Copy)]
pub struct TranscribeRequest<'a> {
    /// 16 kHz mono WAV.
    pub audio_path: &'a Path,
    pub model_path: &'a Path,
    pub opts: &'a TranscribeOpts,
}

/// Speech-to-text capability.
///
/// Implementations block until the transcript is ready and should honour `cancel` for long
/// runs. Production engines shell out or call into whisper.cpp; tests return canned transcripts.
pub trait TranscriptionEngine: Send + Sync {
    fn transcribe(&self, req: &TranscribeRequest<'_>, cancel: &CancelToken) -> Result<Transcript>;
}
