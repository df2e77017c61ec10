//! `subtitler`: batch subtitle generation for directories of media files.
//!
//! This crate provides:
//! - A bounded worker pool that transcribes many files concurrently with per-file failure isolation
//! - A resume ledger so interrupted or repeated batches skip work already done
//! - A multi-format subtitle codec (VTT, SRT, TXT, JSON, LRC, ASS, TTML) with streaming encoders
//! - A transcript validator and a markdown batch report
//!
//! Transcription, model lookup and media handling are capabilities behind small traits
//! ([`TranscriptionEngine`], [`ModelResolver`], [`MediaToolkit`]), so the scheduler and codec
//! never depend on a specific engine. Production implementations shell out to `whisper-cli` and
//! `ffmpeg`; the `whisper` feature adds an in-process engine.

// Errors.
pub mod error;

// Core data and subtitle formats.
pub mod codec;
pub mod output_type;
pub mod segment_encoder;
pub mod segments;
pub mod validator;

// Batch orchestration.
pub mod batch;
pub mod cancel;
pub mod job;
pub mod ledger;
pub mod pipeline;
pub mod report;
pub mod scheduler;

// Collaborators and their production implementations.
pub mod backends;
pub mod engine;
pub mod media;
pub mod models;
pub mod process;
pub mod wav;

pub mod config;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

#[cfg(test)]
mod testing;

pub use batch::{BatchOpts, run_batch};
pub use cancel::CancelToken;
pub use engine::{TranscribeOpts, TranscribeRequest, TranscriptionEngine};
pub use error::{Error, Result};
pub use job::{Job, JobResult, JobStatus};
pub use ledger::{Fingerprint, LedgerEntry, ResumeLedger};
pub use media::{FfmpegToolkit, MediaToolkit};
pub use models::{ModelManager, ModelResolver};
pub use output_type::OutputType;
pub use pipeline::Pipeline;
pub use report::{BatchReporter, BatchSummary};
pub use scheduler::{JobScheduler, Progress, SchedulerOpts};
pub use segments::{Segment, Transcript};
pub use validator::{ValidationOpts, ValidationResult};
