use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The supported subtitle formats.
///
/// Why this exists:
/// - We want a single, strongly-typed representation of output formats
///   across the CLI, the batch scheduler, the ledger fingerprint and the codec.
/// - Using an enum avoids stringly-typed conditionals and keeps format
///   selection explicit and discoverable.
///
/// Integration notes:
/// - With the `cli` feature, `ValueEnum` allows this enum to be used directly as a `clap` flag.
/// - Each variant maps to a concrete `SegmentEncoder` implementation in [`crate::codec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// WebVTT cues.
    Vtt,

    /// SubRip cues with sequential numbering.
    Srt,

    /// Plain text, one line per segment.
    Txt,

    /// Machine-readable JSON with millisecond timing.
    Json,

    /// LRC lyrics with centisecond start times.
    Lrc,

    /// Advanced SubStation Alpha.
    Ass,

    /// Timed Text Markup Language (XML).
    Ttml,
}

impl OutputType {
    pub const ALL: [OutputType; 7] = [
        OutputType::Vtt,
        OutputType::Srt,
        OutputType::Txt,
        OutputType::Json,
        OutputType::Lrc,
        OutputType::Ass,
        OutputType::Ttml,
    ];

    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputType::Vtt => "vtt",
            OutputType::Srt => "srt",
            OutputType::Txt => "txt",
            OutputType::Json => "json",
            OutputType::Lrc => "lrc",
            OutputType::Ass => "ass",
            OutputType::Ttml => "ttml",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputType::Vtt => "text/vtt; charset=utf-8",
            OutputType::Srt => "application/x-subrip; charset=utf-8",
            OutputType::Txt => "text/plain; charset=utf-8",
            OutputType::Json => "application/json; charset=utf-8",
            OutputType::Lrc => "text/plain; charset=utf-8",
            OutputType::Ass => "text/x-ssa; charset=utf-8",
            OutputType::Ttml => "application/ttml+xml; charset=utf-8",
        }
    }

    /// Whether decoding this format loses segment end times.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputType::Txt | OutputType::Lrc)
    }

    /// Infer the format from a file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::format(format!("'{}' has no file extension", path.display())))?;
        ext.parse()
    }
}

impl FromStr for OutputType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vtt" | "webvtt" => Ok(OutputType::Vtt),
            "srt" | "subrip" => Ok(OutputType::Srt),
            "txt" | "text" => Ok(OutputType::Txt),
            "json" => Ok(OutputType::Json),
            "lrc" => Ok(OutputType::Lrc),
            "ass" | "ssa" => Ok(OutputType::Ass),
            "ttml" | "dfxp" | "xml" => Ok(OutputType::Ttml),
            other => Err(Error::format(format!(
                "unsupported format '{other}' (expected one of: vtt, srt, txt, json, lrc, ass, ttml)"
            ))),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_values_case_insensitively() -> anyhow::Result<()> {
        assert_eq!(" SRT ".parse::<OutputType>()?, OutputType::Srt);
        assert_eq!("WebVTT".parse::<OutputType>()?, OutputType::Vtt);
        assert_eq!("ssa".parse::<OutputType>()?, OutputType::Ass);
        assert_eq!("dfxp".parse::<OutputType>()?, OutputType::Ttml);
        Ok(())
    }

    #[test]
    fn parse_rejects_unknown_value() {
        let err = "sub".parse::<OutputType>().unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn display_round_trips_through_from_str() -> anyhow::Result<()> {
        for ty in OutputType::ALL {
            assert_eq!(ty.to_string().parse::<OutputType>()?, ty);
        }
        Ok(())
    }

    #[test]
    fn from_path_uses_extension() -> anyhow::Result<()> {
        assert_eq!(OutputType::from_path(Path::new("a/b.ass"))?, OutputType::Ass);
        assert!(OutputType::from_path(Path::new("noext")).is_err());
        Ok(())
    }
}
