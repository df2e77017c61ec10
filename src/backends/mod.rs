/// Subprocess engine driving whisper.cpp's command-line tool.
pub mod whisper_cli;

/// In-process whisper.cpp engine.
#[cfg(feature = "whisper")]
pub mod whisper;
