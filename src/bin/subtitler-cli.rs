use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use subtitler::backends::whisper_cli::WhisperCliEngine;
use subtitler::config::Settings;
use subtitler::report::REPORT_FILE_NAME;
use subtitler::{
    BatchOpts, CancelToken, FfmpegToolkit, Job, JobStatus, ModelManager, OutputType, Pipeline,
    TranscribeOpts, TranscriptionEngine, codec, logging, run_batch, validator,
};

#[derive(Parser, Debug)]
#[command(name = "subtitler")]
#[command(about = "Generate, convert and validate subtitles for whole directories of media")]
struct Cli {
    /// Settings file (otherwise $SUBTITLER_CONFIG, then ./subtitler.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe every media file in a directory.
    Batch(BatchArgs),
    /// Transcribe a single media file.
    Transcribe(TranscribeArgs),
    /// Convert a subtitle file between formats.
    Convert(ConvertArgs),
    /// Check a subtitle file for timing and structural problems.
    Validate(ValidateArgs),
    /// List supported subtitle formats.
    Formats,
    /// List known models and whether they are installed.
    Models {
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
}

/// Options shared by every command that runs the transcription engine.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Model name, e.g. base, small.en, large-v3-turbo.
    #[arg(short = 'm', long)]
    model: Option<String>,

    #[arg(short = 'f', long, value_enum)]
    format: Option<OutputType>,

    /// Directory containing ggml-{model}.bin files.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// whisper-cli executable.
    #[arg(long)]
    whisper_bin: Option<PathBuf>,

    /// ffmpeg executable.
    #[arg(long)]
    ffmpeg_bin: Option<PathBuf>,

    /// Engine threads per transcription.
    #[arg(long)]
    threads: Option<usize>,

    /// Spoken language; "auto" detects it.
    #[arg(long)]
    language: Option<String>,

    /// Translate to English.
    #[arg(long, default_value_t = false)]
    translate: bool,

    /// Seconds a cancelled subprocess may keep running before it is killed.
    #[arg(long)]
    grace_secs: Option<u64>,

    /// Run whisper.cpp in-process instead of spawning whisper-cli.
    #[cfg(feature = "whisper")]
    #[arg(long, default_value_t = false)]
    in_process: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[arg(short = 'i', long)]
    input_dir: PathBuf,

    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Skip files already completed by an earlier run with the same settings.
    #[arg(long, default_value_t = false)]
    resume: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct TranscribeArgs {
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Directory for the subtitle file.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Also write a copy of the input with the subtitles muxed in.
    #[arg(long)]
    embed: Option<PathBuf>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[arg(short = 'i', long)]
    input: PathBuf,

    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Input format; inferred from the extension when omitted.
    #[arg(long, value_enum)]
    from: Option<OutputType>,

    /// Output format; inferred from the extension when omitted.
    #[arg(long, value_enum)]
    to: Option<OutputType>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    file: PathBuf,

    #[arg(long)]
    overlap_tolerance_ms: Option<u64>,

    /// Duration of the source media, enabling the past-the-end check.
    #[arg(long)]
    source_duration_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    logging::init();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(error = ?err, "subtitler-cli failed");
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut settings =
        Settings::discover(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Command::Batch(args) => batch(args, &mut settings).await,
        Command::Transcribe(args) => transcribe(args, &mut settings).await,
        Command::Convert(args) => convert(&args, &settings),
        Command::Validate(args) => validate(&args, &settings),
        Command::Formats => {
            for ty in OutputType::ALL {
                println!("{ty:<5} {}", ty.mime());
            }
            Ok(0)
        }
        Command::Models { models_dir } => {
            let dir = models_dir.unwrap_or(settings.paths.models_dir);
            let manager = ModelManager::new(&dir);
            for (name, installed) in manager.list() {
                let mark = if installed { "installed" } else { "-" };
                println!("{name:<20} {mark}");
            }
            Ok(0)
        }
    }
}

impl EngineArgs {
    /// Fold flags into `settings`; flags win.
    fn apply(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.whisper.default_model = model.clone();
        }
        if let Some(format) = self.format {
            settings.formats.default = format;
        }
        if let Some(dir) = &self.models_dir {
            settings.paths.models_dir = dir.clone();
        }
        if let Some(bin) = &self.whisper_bin {
            settings.whisper.binary_path = bin.clone();
        }
        if let Some(bin) = &self.ffmpeg_bin {
            settings.ffmpeg.binary_path = bin.clone();
        }
        if let Some(threads) = self.threads {
            settings.whisper.threads = threads;
        }
        if let Some(language) = &self.language {
            settings.whisper.language = Some(language.clone());
        }
        if let Some(secs) = self.grace_secs {
            settings.batch.grace_period_secs = secs;
        }
    }

    fn pipeline(&self, settings: &Settings) -> Pipeline {
        let grace = settings.batch.grace_period();
        let engine = self.engine(settings, grace);
        let models = Arc::new(ModelManager::new(&settings.paths.models_dir));
        let media = Arc::new(
            FfmpegToolkit::new(&settings.ffmpeg.binary_path).with_grace_period(grace),
        );

        let language = settings
            .whisper
            .language
            .clone()
            .filter(|l| !l.eq_ignore_ascii_case("auto"));
        Pipeline::new(engine, models, media)
            .with_transcribe_opts(TranscribeOpts {
                threads: settings.whisper.threads.max(1),
                language,
                translate: self.translate,
            })
            .with_validation_opts(settings.batch.validation_opts())
    }

    #[cfg(feature = "whisper")]
    fn engine(&self, settings: &Settings, grace: Duration) -> Arc<dyn TranscriptionEngine> {
        if self.in_process {
            return Arc::new(subtitler::backends::whisper::WhisperEngine::new());
        }
        Arc::new(WhisperCliEngine::new(&settings.whisper.binary_path).with_grace_period(grace))
    }

    #[cfg(not(feature = "whisper"))]
    fn engine(&self, settings: &Settings, grace: Duration) -> Arc<dyn TranscriptionEngine> {
        Arc::new(WhisperCliEngine::new(&settings.whisper.binary_path).with_grace_period(grace))
    }
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stop requested; finishing in-flight files");
            warn!("interrupt received; cancelling");
            token.cancel();
        }
    });
}

async fn batch(args: BatchArgs, settings: &mut Settings) -> Result<i32> {
    args.engine.apply(settings);
    if let Some(workers) = args.workers {
        settings.batch.workers = workers;
    }
    if let Some(output) = &args.output {
        settings.paths.output_dir = output.clone();
    }

    let pipeline = Arc::new(args.engine.pipeline(settings));
    let opts = BatchOpts {
        model_name: settings.whisper.default_model.clone(),
        output_format: settings.formats.default,
        workers: settings.batch.workers,
        resume: args.resume,
        extensions: settings.batch.extensions.clone(),
    };
    let input_dir = args.input_dir;
    let output_dir = settings.paths.output_dir.clone();

    let cancel = CancelToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .context("invalid progress template")?
        .progress_chars("#>-"),
    );

    let task_bar = bar.clone();
    let task_output = output_dir.clone();
    let summary = tokio::task::spawn_blocking(move || {
        run_batch(
            &input_dir,
            &task_output,
            &opts,
            pipeline,
            &mut |p| {
                task_bar.set_length(p.total as u64);
                task_bar.set_position(p.completed as u64);
                let name = p
                    .file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match (p.status, p.error) {
                    (JobStatus::Failed, Some(err)) => {
                        task_bar.println(format!("failed  {name}: {err}"));
                    }
                    (status, _) => task_bar.set_message(format!("{status} {name}")),
                }
            },
            &cancel,
        )
    })
    .await
    .context("batch worker panicked")??;
    bar.finish_and_clear();

    println!(
        "{} file(s): {} succeeded, {} failed, {} skipped in {:.1}s",
        summary.total_files,
        summary.successful,
        summary.failed,
        summary.skipped,
        summary.total_duration_seconds
    );
    if summary.interrupted {
        println!("interrupted: {} file(s) not started", summary.not_started);
    }
    println!("report: {}", output_dir.join(REPORT_FILE_NAME).display());

    info!(failed = summary.failed, "batch command finished");
    Ok(if summary.has_failures() || summary.interrupted { 1 } else { 0 })
}

async fn transcribe(args: TranscribeArgs, settings: &mut Settings) -> Result<i32> {
    args.engine.apply(settings);
    let pipeline = args.engine.pipeline(settings);
    let output_dir = args
        .output
        .clone()
        .or_else(|| args.input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let job = Job::new(
        &args.input,
        &settings.whisper.default_model,
        settings.formats.default,
    );
    let embed = args.embed;

    let cancel = CancelToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let subtitle = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let subtitle = pipeline
            .process(&job, &output_dir, &cancel)
            .with_context(|| format!("failed to transcribe '{}'", job.input_path.display()))?;
        if let Some(out) = embed {
            pipeline
                .embed(&job.input_path, &subtitle, &out, &cancel)
                .with_context(|| format!("failed to embed subtitles into '{}'", out.display()))?;
            println!("embedded: {}", out.display());
        }
        Ok(subtitle)
    })
    .await
    .context("transcription worker panicked")??;

    println!("wrote: {}", subtitle.display());
    Ok(0)
}

fn convert(args: &ConvertArgs, settings: &Settings) -> Result<i32> {
    let transcript = codec::convert_file(
        &args.input,
        &args.output,
        args.from,
        args.to,
        &settings.batch.validation_opts(),
    )
    .with_context(|| {
        format!(
            "failed to convert '{}' to '{}'",
            args.input.display(),
            args.output.display()
        )
    })?;
    println!(
        "wrote {} segment(s) to {}",
        transcript.len(),
        args.output.display()
    );
    Ok(0)
}

fn validate(args: &ValidateArgs, settings: &Settings) -> Result<i32> {
    let ty = OutputType::from_path(&args.file)?;
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read '{}'", args.file.display()))?;
    let mut transcript = codec::decode(&content, ty)
        .with_context(|| format!("failed to parse '{}'", args.file.display()))?;
    if args.source_duration_ms.is_some() {
        transcript.source_duration_ms = args.source_duration_ms;
    }

    let mut opts = settings.batch.validation_opts();
    if let Some(tolerance) = args.overlap_tolerance_ms {
        opts.overlap_tolerance_ms = tolerance;
    }

    let result = validator::validate(&transcript, &opts);
    for issue in &result.errors {
        println!("error: {}", issue.message);
    }
    for issue in &result.warnings {
        println!("warning: {}", issue.message);
    }
    if !result.is_valid {
        eprintln!(
            "{}: {} validation error(s)",
            args.file.display(),
            result.errors.len()
        );
        return Ok(1);
    }
    println!("{}: ok ({} segment(s))", args.file.display(), transcript.len());
    Ok(0)
}
