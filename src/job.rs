//! Jobs, their outcomes, and input discovery.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::output_type::OutputType;
use crate::{Error, Result};

/// Media extensions picked up by [`discover_jobs`] when none are configured.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "m4v", "flv", "wmv", "mpeg", "mpg", "mp3", "wav", "flac",
    "aac", "ogg", "m4a", "wma",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Skipped)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One input file's end-to-end processing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Stable identifier; the input's file name.
    pub id: String,
    pub input_path: PathBuf,
    pub model_name: String,
    pub output_format: OutputType,
    pub status: JobStatus,
}

impl Job {
    pub fn new(
        input_path: impl Into<PathBuf>,
        model_name: impl Into<String>,
        output_format: OutputType,
    ) -> Self {
        let input_path = input_path.into();
        let id = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_path.to_string_lossy().into_owned());
        Self {
            id,
            input_path,
            model_name: model_name.into(),
            output_format,
            status: JobStatus::Pending,
        }
    }

    /// Input file stem, used to name the output.
    pub fn stem(&self) -> String {
        self.input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.clone())
    }

    /// Where this job's subtitle lands inside `output_dir`.
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.{}", self.stem(), self.output_format.extension()))
    }
}

/// The immutable outcome of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub file_path: PathBuf,
    pub status: JobStatus,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    /// RFC 3339, UTC.
    pub timestamp: String,
    /// Set when the output was written but the ledger entry was not. The job still counts as
    /// successful; a later resume redoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<String>,
}

impl JobResult {
    pub fn done(job: &Job, output_path: PathBuf, duration_seconds: f64) -> Self {
        Self::build(job, JobStatus::Done, Some(output_path), None, duration_seconds)
    }

    /// Success without work: the ledger already holds a matching entry.
    pub fn skipped(job: &Job, output_path: PathBuf) -> Self {
        Self::build(job, JobStatus::Skipped, Some(output_path), None, 0.0)
    }

    pub fn failed(job: &Job, error: impl Into<String>, duration_seconds: f64) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_owned();
        }
        Self::build(job, JobStatus::Failed, None, Some(error), duration_seconds)
    }

    fn build(
        job: &Job,
        status: JobStatus,
        output_path: Option<PathBuf>,
        error: Option<String>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            file_path: job.input_path.clone(),
            status,
            success: status != JobStatus::Failed,
            output_path,
            error,
            duration_seconds,
            timestamp: now_rfc3339(),
            ledger_error: None,
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// List media files directly inside `input_dir` and turn each into a pending [`Job`].
///
/// Extensions match case-insensitively; an empty list means [`DEFAULT_MEDIA_EXTENSIONS`]. Jobs are
/// sorted by path. Two inputs that would write the same output file are rejected.
pub fn discover_jobs(
    input_dir: &Path,
    model_name: &str,
    output_format: OutputType,
    extensions: &[String],
) -> Result<Vec<Job>> {
    let read_dir = std::fs::read_dir(input_dir).map_err(|e| {
        Error::setup(format!(
            "cannot read input directory '{}': {e}",
            input_dir.display()
        ))
    })?;

    let wanted: Vec<String> = if extensions.is_empty() {
        DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect()
    } else {
        extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    };

    let mut paths = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| {
            Error::setup(format!(
                "cannot list input directory '{}': {e}",
                input_dir.display()
            ))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| wanted.iter().any(|w| w.eq_ignore_ascii_case(e)));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();

    let jobs: Vec<Job> = paths
        .into_iter()
        .map(|p| Job::new(p, model_name, output_format))
        .collect();

    let mut by_stem: HashMap<String, &Job> = HashMap::new();
    for job in &jobs {
        if let Some(other) = by_stem.insert(job.stem(), job) {
            return Err(Error::setup(format!(
                "'{}' and '{}' would both write {}.{}",
                other.id,
                job.id,
                job.stem(),
                output_format.extension()
            )));
        }
    }

    debug!(dir = %input_dir.display(), count = jobs.len(), "discovered jobs");
    Ok(jobs)
}
