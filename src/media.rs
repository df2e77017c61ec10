//! Audio extraction and subtitle muxing through an external media toolkit.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::info;

use crate::cancel::CancelToken;
use crate::process::run_command;
use crate::{Error, Result};

/// Sample rate the transcription engines expect.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Narrow contract over the media toolkit: a path in, a path out.
pub trait MediaToolkit: Send + Sync {
    /// Extract a 16 kHz mono PCM WAV from `input` into `scratch_dir`.
    fn extract_audio(&self, input: &Path, scratch_dir: &Path, cancel: &CancelToken)
    -> Result<PathBuf>;

    /// Mux `subtitle` into a copy of `video` written to `output`.
    fn embed_subtitles(
        &self,
        video: &Path,
        subtitle: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf>;
}

/// [`MediaToolkit`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    binary: PathBuf,
    grace: Duration,
}

impl FfmpegToolkit {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            grace: Duration::from_secs(5),
        }
    }

    /// How long a cancelled ffmpeg may keep running before it is killed.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run ffmpeg, reporting spawn and exit failures through `fail`.
    fn run(
        &self,
        cmd: &mut Command,
        cancel: &CancelToken,
        fail: fn(String) -> Error,
    ) -> Result<()> {
        let out = run_command(cmd, cancel, self.grace).map_err(|e| match e {
            Error::Io(io) => fail(format!("failed to run '{}': {io}", self.binary.display())),
            other => other,
        })?;
        if !out.success() {
            return Err(fail(format!("ffmpeg {}", out.failure_message())));
        }
        Ok(())
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaToolkit for FfmpegToolkit {
    fn extract_audio(
        &self,
        input: &Path,
        scratch_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        if !input.is_file() {
            return Err(Error::AudioExtraction(format!(
                "input not found: '{}'",
                input.display()
            )));
        }

        // The scratch directory belongs to a single job.
        let wav = scratch_dir.join("audio.wav");
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-ar"])
            .arg(TARGET_SAMPLE_RATE.to_string())
            .args(["-ac", "1", "-c:a", "pcm_s16le"])
            .arg(&wav);

        self.run(&mut cmd, cancel, Error::AudioExtraction)?;
        if !wav.is_file() {
            return Err(Error::AudioExtraction(format!(
                "ffmpeg produced no audio for '{}'",
                input.display()
            )));
        }
        Ok(wav)
    }

    fn embed_subtitles(
        &self,
        video: &Path,
        subtitle: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        for path in [video, subtitle] {
            if !path.is_file() {
                return Err(Error::Embed(format!("input not found: '{}'", path.display())));
            }
        }

        let codec = subtitle_codec_for(output, subtitle);
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"])
            .arg(video)
            .arg("-i")
            .arg(subtitle)
            .args(["-map", "0", "-map", "1", "-c", "copy", "-c:s", codec])
            .arg(output);

        self.run(&mut cmd, cancel, Error::Embed)?;
        info!(video = %video.display(), output = %output.display(), codec, "embedded subtitles");
        Ok(output.to_path_buf())
    }
}

/// Subtitle stream codec accepted by the output container.
fn subtitle_codec_for(output: &Path, subtitle: &Path) -> &'static str {
    let ext = |p: &Path| {
        p.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    };
    match ext(output).as_str() {
        "mp4" | "m4v" | "mov" => "mov_text",
        "webm" => "webvtt",
        "mkv" if ext(subtitle) == "ass" => "ass",
        _ => "srt",
    }
}
