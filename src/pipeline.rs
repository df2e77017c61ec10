//! End-to-end processing of a single input file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::codec;
use crate::engine::{TranscribeOpts, TranscribeRequest, TranscriptionEngine};
use crate::job::Job;
use crate::media::MediaToolkit;
use crate::models::ModelResolver;
use crate::output_type::OutputType;
use crate::segments::Transcript;
use crate::validator::{self, ValidationOpts};
use crate::Result;

/// The collaborators a job needs, wired together.
///
/// A `Pipeline` is shared by every worker in a batch; all of its parts are `Send + Sync`.
#[derive(Clone)]
pub struct Pipeline {
    engine: Arc<dyn TranscriptionEngine>,
    models: Arc<dyn ModelResolver>,
    media: Arc<dyn MediaToolkit>,
    transcribe_opts: TranscribeOpts,
    validation: ValidationOpts,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn TranscriptionEngine>,
        models: Arc<dyn ModelResolver>,
        media: Arc<dyn MediaToolkit>,
    ) -> Self {
        Self {
            engine,
            models,
            media,
            transcribe_opts: TranscribeOpts::default(),
            validation: ValidationOpts::default(),
        }
    }

    pub fn with_transcribe_opts(mut self, opts: TranscribeOpts) -> Self {
        self.transcribe_opts = opts;
        self
    }

    pub fn with_validation_opts(mut self, opts: ValidationOpts) -> Self {
        self.validation = opts;
        self
    }

    pub fn transcribe_opts(&self) -> &TranscribeOpts {
        &self.transcribe_opts
    }

    /// Resolve the model, extract audio into a scratch directory and transcribe it.
    ///
    /// The transcript is validated advisorily: issues are logged, never raised.
    pub fn transcribe_file(
        &self,
        input: &Path,
        model_name: &str,
        cancel: &CancelToken,
    ) -> Result<Transcript> {
        cancel.check()?;
        let model_path = self.models.resolve(model_name)?;

        let scratch = tempfile::Builder::new().prefix("subtitler-").tempdir()?;
        let audio = self.media.extract_audio(input, scratch.path(), cancel)?;
        debug!(input = %input.display(), audio = %audio.display(), "extracted audio");

        cancel.check()?;
        let req = TranscribeRequest {
            audio_path: &audio,
            model_path: &model_path,
            opts: &self.transcribe_opts,
        };
        let transcript = self.engine.transcribe(&req, cancel)?;

        let report = validator::validate(&transcript, &self.validation);
        for issue in report.errors.iter().chain(&report.warnings) {
            warn!(input = %input.display(), kind = %issue.kind, "{}", issue.message);
        }

        Ok(transcript)
    }

    /// Run one job: transcribe, encode and atomically write `output_dir/{stem}.{ext}`.
    pub fn process(&self, job: &Job, output_dir: &Path, cancel: &CancelToken) -> Result<PathBuf> {
        let transcript = self.transcribe_file(&job.input_path, &job.model_name, cancel)?;
        cancel.check()?;

        let output = job.output_path(output_dir);
        write_subtitle(&transcript, job.output_format, &output)?;
        debug!(
            job_id = %job.id,
            output = %output.display(),
            segments = transcript.len(),
            "wrote subtitle"
        );
        Ok(output)
    }

    /// Mux a subtitle file into a copy of `video`.
    pub fn embed(
        &self,
        video: &Path,
        subtitle: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        self.media.embed_subtitles(video, subtitle, output, cancel)
    }
}

/// Encode `transcript` and move it into place, so readers never see a half-written file.
pub fn write_subtitle(transcript: &Transcript, ty: OutputType, output: &Path) -> Result<()> {
    let body = codec::encode(transcript, ty)?;

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".subtitler-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(body.as_bytes())?;
    tmp.flush()?;
    tmp.persist(output).map_err(|e| e.error)?;
    Ok(())
}
