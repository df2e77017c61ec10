//! Aggregation of job results into a batch summary and its markdown report.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::Result;
use crate::job::{JobResult, JobStatus};

/// File name of the rendered report inside a batch output directory.
pub const REPORT_FILE_NAME: &str = "batch_report.md";

/// Outcome of a whole batch.
///
/// `total_files == successful + failed + skipped` always holds; it counts accumulated results
/// only. Jobs never started because of a stop signal are counted in `not_started`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_seconds: f64,
    /// In accumulation order, which is completion order.
    pub results: Vec<JobResult>,
    pub interrupted: bool,
    pub not_started: usize,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Reorder results by job id, for callers that need input order.
    pub fn sort_by_job_id(&mut self) {
        self.results.sort_by(|a, b| a.job_id.cmp(&b.job_id));
    }
}

/// Builds a [`BatchSummary`] as results arrive.
#[derive(Debug)]
pub struct BatchReporter {
    results: Vec<JobResult>,
    successful: usize,
    failed: usize,
    skipped: usize,
    started: Instant,
}

impl Default for BatchReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReporter {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            successful: 0,
            failed: 0,
            skipped: 0,
            started: Instant::now(),
        }
    }

    pub fn accumulate(&mut self, result: JobResult) {
        match result.status {
            JobStatus::Skipped => self.skipped += 1,
            _ if result.success => self.successful += 1,
            _ => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn finalize(self) -> BatchSummary {
        BatchSummary {
            total_files: self.results.len(),
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            total_duration_seconds: self.started.elapsed().as_secs_f64(),
            results: self.results,
            interrupted: false,
            not_started: 0,
        }
    }
}

/// Render `summary` as markdown. The output depends only on the summary.
pub fn render(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Batch Processing Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Statistics");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|--------|-------|");
    let _ = writeln!(out, "| Total Files | {} |", summary.total_files);
    let _ = writeln!(out, "| Successful | {} |", summary.successful);
    let _ = writeln!(out, "| Failed | {} |", summary.failed);
    let _ = writeln!(out, "| Skipped | {} |", summary.skipped);
    let _ = writeln!(
        out,
        "| Total Duration | {:.2}s |",
        summary.total_duration_seconds
    );

    if summary.interrupted {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "> Interrupted: {} file(s) were not started.",
            summary.not_started
        );
    }

    if !summary.results.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Processed Files");
        let _ = writeln!(out);
        let _ = writeln!(out, "| File | Status | Duration | Output |");
        let _ = writeln!(out, "|------|--------|----------|--------|");
        for r in &summary.results {
            let status = match r.status {
                JobStatus::Skipped => "Skipped".to_owned(),
                _ if r.success => "Success".to_owned(),
                _ => format!("Failed: {}", r.error.as_deref().unwrap_or("unknown error")),
            };
            let output = r
                .output_path
                .as_deref()
                .map(file_name)
                .unwrap_or_else(|| "-".to_owned());
            let _ = writeln!(
                out,
                "| {} | {} | {:.2}s | {} |",
                cell(&file_name(&r.file_path)),
                cell(&status),
                r.duration_seconds,
                cell(&output)
            );
        }
    }

    out
}

/// Render and write the report to `path`.
pub fn write_report(summary: &BatchSummary, path: &Path) -> Result<()> {
    std::fs::write(path, render(summary))?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Keep a value on one table row.
fn cell(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}
