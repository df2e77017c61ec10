//! One-call batch entry point: discovery, ledger, scheduling and the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::Result;
use crate::cancel::CancelToken;
use crate::job::discover_jobs;
use crate::ledger::{LEDGER_FILE_NAME, ResumeLedger};
use crate::models::DEFAULT_MODEL;
use crate::output_type::OutputType;
use crate::pipeline::Pipeline;
use crate::report::{self, BatchSummary, REPORT_FILE_NAME};
use crate::scheduler::{DEFAULT_POOL_SIZE, JobScheduler, Progress, SchedulerOpts};

/// What to run a batch with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOpts {
    pub model_name: String,
    pub output_format: OutputType,
    pub workers: usize,
    pub resume: bool,
    /// Media extensions to pick up; empty means the built-in list.
    pub extensions: Vec<String>,
}

impl Default for BatchOpts {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_owned(),
            output_format: OutputType::Srt,
            workers: DEFAULT_POOL_SIZE,
            resume: false,
            extensions: Vec::new(),
        }
    }
}

/// Where the ledger for `output_dir` lives.
pub fn ledger_path(output_dir: &Path) -> PathBuf {
    output_dir.join(LEDGER_FILE_NAME)
}

/// Transcribe every media file in `input_dir` into `output_dir`.
///
/// Fails only on setup problems (unreadable input directory, conflicting outputs, an unusable
/// output directory or an unreadable ledger); per-file failures are reported in
/// the summary. The markdown report is written to `output_dir/batch_report.md`.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    opts: &BatchOpts,
    pipeline: Arc<Pipeline>,
    on_progress: &mut dyn FnMut(&Progress<'_>),
    cancel: &CancelToken,
) -> Result<BatchSummary> {
    let jobs = discover_jobs(
        input_dir,
        &opts.model_name,
        opts.output_format,
        &opts.extensions,
    )?;
    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        jobs = jobs.len(),
        "discovered inputs"
    );

    // Loaded even for fresh runs so their records extend the file instead of replacing it.
    // Whether entries are consulted is up to the scheduler.
    let ledger = ResumeLedger::load(ledger_path(output_dir))?;

    let scheduler = JobScheduler::new(
        pipeline,
        Arc::new(ledger),
        SchedulerOpts {
            pool_size: opts.workers,
            resume: opts.resume,
            output_dir: output_dir.to_path_buf(),
        },
    )?;
    let summary = scheduler.run(jobs, cancel, on_progress)?;

    let report_path = output_dir.join(REPORT_FILE_NAME);
    if let Err(e) = report::write_report(&summary, &report_path) {
        warn!(path = %report_path.display(), error = %e, "could not write batch report");
    }

    Ok(summary)
}
