use std::path::PathBuf;

use thiserror::Error;

/// Subtitler's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Subtitler's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
///
/// Errors raised inside a single job's pipeline are caught at the job boundary and turned into a
/// failed [`crate::job::JobResult`]; only `Setup`, `Config` and ledger *load* failures abort a batch.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested model name is unknown or its weights are not available locally.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The transcription engine failed or produced output we could not parse.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// The media toolkit failed to extract audio.
    #[error("audio extraction failed: {0}")]
    AudioExtraction(String),

    /// The media toolkit failed to mux subtitles into a video.
    #[error("embedding subtitles failed: {0}")]
    Embed(String),

    /// Malformed subtitle input or an unsupported format.
    #[error("format error: {0}")]
    Format(String),

    /// A decoded transcript violates structural or timing invariants.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The persisted resume ledger could not be read or written.
    #[error("ledger I/O error on '{}': {source}", path.display())]
    LedgerIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Batch setup failed before any job was dispatched.
    #[error("batch setup failed: {0}")]
    Setup(String),

    /// Work was abandoned because a stop signal was received.
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn setup(message: impl Into<String>) -> Self {
        Self::Setup(message.into())
    }

    pub(crate) fn ledger_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LedgerIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was produced by cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Format(format!("subtitle input is not valid UTF-8: {err}"))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::Format(format!("subtitle input is not valid UTF-8: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_messages() {
        let err = Error::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation failed: a; b");
    }

    #[test]
    fn ledger_io_mentions_path() {
        let err = Error::ledger_io(
            "/tmp/ledger.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/ledger.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn cancelled_is_detectable() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::format("x").is_cancelled());
    }
}
