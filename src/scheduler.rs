//! Bounded worker pool that runs jobs, consults the resume ledger and reports progress.
//!
//! Workers are plain threads pulling from one shared FIFO queue, so no job is ever handed to two
//! workers. Results flow over a bounded channel to a single collector on the calling thread,
//! which feeds the [`BatchReporter`] and invokes the progress callback one result at a time.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::job::{Job, JobResult, JobStatus, now_rfc3339};
use crate::ledger::{Fingerprint, LedgerEntry, ResumeLedger};
use crate::pipeline::Pipeline;
use crate::report::{BatchReporter, BatchSummary};
use crate::{Error, Result};

/// Default number of concurrent workers.
pub const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOpts {
    /// Number of concurrent workers; must be at least 1.
    pub pool_size: usize,
    /// Skip jobs whose fingerprint is already in the ledger.
    pub resume: bool,
    /// Directory receiving one subtitle file per job.
    pub output_dir: PathBuf,
}

impl SchedulerOpts {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            resume: false,
            output_dir: output_dir.into(),
        }
    }
}

/// One progress notification, emitted after each job result is finalized.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub file_path: &'a Path,
    /// Results finalized so far, including this one.
    pub completed: usize,
    pub total: usize,
    pub status: JobStatus,
    pub error: Option<&'a str>,
}

pub struct JobScheduler {
    pipeline: Arc<Pipeline>,
    ledger: Arc<ResumeLedger>,
    opts: SchedulerOpts,
}

impl JobScheduler {
    pub fn new(pipeline: Arc<Pipeline>, ledger: Arc<ResumeLedger>, opts: SchedulerOpts) -> Result<Self> {
        if opts.pool_size == 0 {
            return Err(Error::setup("worker pool size must be at least 1"));
        }
        Ok(Self {
            pipeline,
            ledger,
            opts,
        })
    }

    pub fn opts(&self) -> &SchedulerOpts {
        &self.opts
    }

    /// Run every job and return the summary.
    ///
    /// Per-job failures become failed results; only an unusable output directory aborts the run,
    /// before any job starts. When `cancel` fires, no further jobs are dequeued, in-flight jobs
    /// finish or are killed after their grace period, and the summary is marked interrupted.
    pub fn run(
        &self,
        jobs: Vec<Job>,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&Progress<'_>),
    ) -> Result<BatchSummary> {
        std::fs::create_dir_all(&self.opts.output_dir).map_err(|e| {
            Error::setup(format!(
                "cannot create output directory '{}': {e}",
                self.opts.output_dir.display()
            ))
        })?;

        let total = jobs.len();
        let workers = self.opts.pool_size.min(total.max(1));
        info!(total, workers, resume = self.opts.resume, "starting batch");

        let queue = Mutex::new(jobs.into_iter().collect::<VecDeque<Job>>());
        let (tx, rx) = mpsc::sync_channel::<JobResult>(workers);
        let mut reporter = BatchReporter::new();

        thread::scope(|scope| {
            for worker_id in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || self.worker_loop(worker_id, queue, &tx, cancel));
            }
            // The collector ends once every worker has dropped its sender.
            drop(tx);

            for result in rx {
                reporter.accumulate(result.clone());
                on_progress(&Progress {
                    file_path: &result.file_path,
                    completed: reporter.len(),
                    total,
                    status: result.status,
                    error: result.error.as_deref(),
                });
            }
        });

        let not_started = queue.lock().map(|q| q.len()).unwrap_or_default();
        let mut summary = reporter.finalize();
        summary.interrupted = cancel.is_cancelled();
        summary.not_started = not_started;

        info!(
            total = summary.total_files,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            not_started,
            interrupted = summary.interrupted,
            "batch finished"
        );
        Ok(summary)
    }

    fn worker_loop(
        &self,
        worker_id: usize,
        queue: &Mutex<VecDeque<Job>>,
        tx: &mpsc::SyncSender<JobResult>,
        cancel: &CancelToken,
    ) {
        loop {
            if cancel.is_cancelled() {
                debug!(worker_id, "stop requested; not dequeuing further jobs");
                return;
            }

            let next = match queue.lock() {
                Ok(mut q) => q.pop_front(),
                Err(_) => {
                    error!(worker_id, "job queue lock poisoned");
                    return;
                }
            };
            let Some(mut job) = next else {
                return;
            };

            job.status = JobStatus::Running;
            debug!(worker_id, job_id = %job.id, "job running");

            let result = self.execute(&job, cancel);
            if tx.send(result).is_err() {
                return;
            }
        }
    }

    fn execute(&self, job: &Job, cancel: &CancelToken) -> JobResult {
        let started = Instant::now();

        let fingerprint = match Fingerprint::for_job(job) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "cannot fingerprint input");
                return JobResult::failed(job, e.to_string(), started.elapsed().as_secs_f64());
            }
        };

        if self.opts.resume {
            if let Some(output) = self.ledger_hit(job, &fingerprint) {
                info!(job_id = %job.id, output = %output.display(), "skipping completed job");
                return JobResult::skipped(job, output);
            }
        }

        match self.pipeline.process(job, &self.opts.output_dir, cancel) {
            Ok(output) => {
                let mut result =
                    JobResult::done(job, output.clone(), started.elapsed().as_secs_f64());
                let entry = LedgerEntry {
                    fingerprint,
                    completed_at: now_rfc3339(),
                    output_path: output,
                };
                if let Err(e) = self.ledger.record(entry) {
                    warn!(job_id = %job.id, error = %e, "job succeeded but ledger write failed");
                    result.ledger_error = Some(e.to_string());
                }
                info!(job_id = %job.id, elapsed = result.duration_seconds, "job done");
                result
            }
            Err(e) => {
                let elapsed = started.elapsed().as_secs_f64();
                if e.is_cancelled() {
                    warn!(job_id = %job.id, "job cancelled");
                } else {
                    error!(job_id = %job.id, error = %e, "job failed");
                }
                JobResult::failed(job, e.to_string(), elapsed)
            }
        }
    }

    /// A ledger entry only counts while its output still exists.
    fn ledger_hit(&self, job: &Job, fingerprint: &Fingerprint) -> Option<PathBuf> {
        match self.ledger.lookup(fingerprint) {
            Ok(Some(entry)) if entry.output_path.is_file() => Some(entry.output_path),
            Ok(Some(entry)) => {
                debug!(
                    job_id = %job.id,
                    output = %entry.output_path.display(),
                    "ledger entry points at a missing output; reprocessing"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "ledger lookup failed; reprocessing");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::job::discover_jobs;
    use crate::output_type::OutputType;
    use crate::testing::{CannedEngine, media_files, pipeline_with};

    struct Fixture {
        input: tempfile::TempDir,
        output: tempfile::TempDir,
    }

    impl Fixture {
        fn new(names: &[&str]) -> anyhow::Result<Self> {
            let input = tempfile::tempdir()?;
            media_files(input.path(), names)?;
            Ok(Self {
                input,
                output: tempfile::tempdir()?,
            })
        }

        fn jobs(&self) -> anyhow::Result<Vec<Job>> {
            Ok(discover_jobs(self.input.path(), "base", OutputType::Srt, &[])?)
        }

        fn scheduler(
            &self,
            engine: Arc<CannedEngine>,
            ledger: Arc<ResumeLedger>,
            pool_size: usize,
            resume: bool,
        ) -> anyhow::Result<JobScheduler> {
            let opts = SchedulerOpts {
                pool_size,
                resume,
                output_dir: self.output.path().to_path_buf(),
            };
            Ok(JobScheduler::new(Arc::new(pipeline_with(engine)), ledger, opts)?)
        }
    }

    #[test]
    fn zero_workers_is_a_setup_error() {
        let pipeline = Arc::new(pipeline_with(Arc::new(CannedEngine::default())));
        let mut opts = SchedulerOpts::new("/tmp/out");
        opts.pool_size = 0;
        let err = JobScheduler::new(pipeline, Arc::new(ResumeLedger::in_memory()), opts)
            .err()
            .expect("pool size 0 must be rejected");
        assert!(matches!(err, Error::Setup(_)));
    }

    #[test]
    fn failures_are_isolated_and_progress_is_serial() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"])?;
        let engine = Arc::new(CannedEngine::failing(&["b"]));
        let scheduler = fx.scheduler(engine, Arc::new(ResumeLedger::in_memory()), 2, false)?;

        let mut seen = Vec::new();
        let summary = scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |p| {
            seen.push((p.completed, p.total, p.status));
        })?;

        assert_eq!((summary.total_files, summary.successful, summary.failed, summary.skipped), (3, 2, 1, 0));
        let failed = summary.results.iter().find(|r| !r.success).expect("one failure");
        assert_eq!(failed.job_id, "b.mp4");
        assert!(failed.error.as_deref().is_some_and(|e| e.contains("exploded")));

        let completed: Vec<usize> = seen.iter().map(|s| s.0).collect();
        assert_eq!(completed, vec![1, 2, 3]);
        assert!(seen.iter().all(|s| s.1 == 3));

        assert!(fx.output.path().join("a.srt").is_file());
        assert!(fx.output.path().join("c.srt").is_file());
        assert!(!fx.output.path().join("b.srt").exists());
        Ok(())
    }

    #[test]
    fn concurrency_never_exceeds_pool_size() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4", "f.mp4"])?;
        let engine = Arc::new(CannedEngine::default().with_delay(Duration::from_millis(30)));
        let scheduler =
            fx.scheduler(engine.clone(), Arc::new(ResumeLedger::in_memory()), 2, false)?;

        let summary = scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        assert_eq!(summary.successful, 6);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 6);
        assert!(engine.max_running.load(Ordering::SeqCst) <= 2);
        Ok(())
    }

    #[test]
    fn resume_skips_completed_jobs() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4", "b.mp4"])?;
        let ledger = Arc::new(ResumeLedger::in_memory());
        let engine = Arc::new(CannedEngine::default());

        let first = fx.scheduler(engine.clone(), ledger.clone(), 2, true)?;
        first.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);

        let summary = first.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        assert_eq!((summary.successful, summary.failed, summary.skipped), (0, 0, 2));
        assert!(summary.results.iter().all(|r| r.success && r.error.is_none()));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn without_resume_the_ledger_is_ignored() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4"])?;
        let ledger = Arc::new(ResumeLedger::in_memory());
        let engine = Arc::new(CannedEngine::default());
        let scheduler = fx.scheduler(engine.clone(), ledger.clone(), 1, false)?;

        scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        let summary = scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        assert_eq!(summary.successful, 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(ledger.len(), 1);
        Ok(())
    }

    #[test]
    fn deleted_output_is_reprocessed_on_resume() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4"])?;
        let ledger = Arc::new(ResumeLedger::in_memory());
        let engine = Arc::new(CannedEngine::default());
        let scheduler = fx.scheduler(engine.clone(), ledger, 1, true)?;

        scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        std::fs::remove_file(fx.output.path().join("a.srt"))?;
        let summary = scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        assert_eq!(summary.successful, 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn cancelled_before_start_runs_nothing() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4"])?;
        let engine = Arc::new(CannedEngine::default());
        let scheduler = fx.scheduler(engine.clone(), Arc::new(ResumeLedger::in_memory()), 2, false)?;

        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = scheduler.run(fx.jobs()?, &cancel, &mut |_| {})?;
        assert!(summary.interrupted);
        assert_eq!(summary.total_files, 0);
        assert_eq!(summary.not_started, 3);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn cancellation_mid_run_stops_dequeuing() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"])?;
        let engine = Arc::new(CannedEngine::default().with_delay(Duration::from_millis(20)));
        let scheduler = fx.scheduler(engine, Arc::new(ResumeLedger::in_memory()), 1, false)?;

        let cancel = CancelToken::new();
        let summary = scheduler.run(fx.jobs()?, &cancel, &mut |_| cancel.cancel())?;
        assert!(summary.interrupted);
        assert!(summary.total_files >= 1);
        assert_eq!(summary.total_files + summary.not_started, 4);
        Ok(())
    }

    #[test]
    fn ledger_write_failure_keeps_job_successful() -> anyhow::Result<()> {
        let fx = Fixture::new(&["a.mp4"])?;
        // A regular file where the ledger's parent directory should be.
        let blocker = fx.output.path().join("blocker");
        std::fs::write(&blocker, b"")?;
        let ledger = Arc::new(ResumeLedger::fresh(blocker.join("ledger.json")));

        let scheduler = fx.scheduler(Arc::new(CannedEngine::default()), ledger, 1, false)?;
        let summary = scheduler.run(fx.jobs()?, &CancelToken::new(), &mut |_| {})?;
        assert_eq!(summary.successful, 1);
        assert!(summary.results[0].ledger_error.is_some());
        assert!(fx.output.path().join("a.srt").is_file());
        Ok(())
    }
}
