//! Optional TOML settings file.
//!
//! Every section and key has a default, so an empty file (or no file at all) is a valid
//! configuration. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::default_thread_count;
use crate::models::DEFAULT_MODEL;
use crate::output_type::OutputType;
use crate::scheduler::DEFAULT_POOL_SIZE;
use crate::validator::ValidationOpts;
use crate::{Error, Result};

/// Environment variable naming a settings file.
pub const CONFIG_ENV_VAR: &str = "SUBTITLER_CONFIG";

/// Settings file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "subtitler.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub whisper: WhisperSettings,
    pub paths: PathSettings,
    pub formats: FormatSettings,
    pub batch: BatchSettings,
    pub ffmpeg: FfmpegSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperSettings {
    /// `whisper-cli` executable.
    pub binary_path: PathBuf,
    pub threads: usize,
    pub default_model: String,
    /// Spoken language hint; `None` lets the engine detect it.
    pub language: Option<String>,
}

impl Default for WhisperSettings {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("whisper-cli"),
            threads: default_thread_count(),
            default_model: DEFAULT_MODEL.to_owned(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub models_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            output_dir: PathBuf::from("subtitles"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub default: OutputType,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            default: OutputType::Srt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub workers: usize,
    /// Media extensions to pick up; empty means the built-in list.
    pub extensions: Vec<String>,
    /// How long a cancelled subprocess may run before it is killed.
    pub grace_period_secs: u64,
    pub overlap_tolerance_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_POOL_SIZE,
            extensions: Vec::new(),
            grace_period_secs: 5,
            overlap_tolerance_ms: 0,
        }
    }
}

impl BatchSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn validation_opts(&self) -> ValidationOpts {
        ValidationOpts {
            overlap_tolerance_ms: self.overlap_tolerance_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegSettings {
    pub binary_path: PathBuf,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl Settings {
    /// Parse a settings document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse the settings file at `path`, which must exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("invalid settings in '{}': {e}", path.display())))
    }

    /// Load settings from the first source that applies.
    ///
    /// `explicit` (the `--config` flag) wins, then `$SUBTITLER_CONFIG`, then `./subtitler.toml`.
    /// A path named by the flag or the variable must exist; a missing working-directory file
    /// means defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self::load_file(Path::new(&path));
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load_file(local);
        }
        debug!("no settings file found; using defaults");
        Ok(Self::default())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() -> anyhow::Result<()> {
        assert_eq!(Settings::from_toml("")?, Settings::default());
        Ok(())
    }

    #[test]
    fn partial_sections_keep_other_defaults() -> anyhow::Result<()> {
        let s = Settings::from_toml(
            r#"
            [whisper]
            default_model = "small"
            language = "de"

            [formats]
            default = "vtt"

            [batch]
            workers = 2
            extensions = ["mkv", ".MP4"]
            overlap_tolerance_ms = 40
            "#,
        )?;
        assert_eq!(s.whisper.default_model, "small");
        assert_eq!(s.whisper.language.as_deref(), Some("de"));
        assert_eq!(s.whisper.binary_path, PathBuf::from("whisper-cli"));
        assert_eq!(s.formats.default, OutputType::Vtt);
        assert_eq!(s.batch.workers, 2);
        assert_eq!(s.batch.extensions, vec!["mkv", ".MP4"]);
        assert_eq!(s.batch.grace_period(), Duration::from_secs(5));
        assert_eq!(s.batch.validation_opts().overlap_tolerance_ms, 40);
        assert_eq!(s.ffmpeg, FfmpegSettings::default());
        Ok(())
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = Settings::from_toml("[batch]\nworkers = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_missing_file_is_a_config_error() {
        let err = Settings::discover(Some(Path::new("/nonexistent/subtitler.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_file_is_loaded() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[paths]\nmodels_dir = \"/opt/models\"\n")?;

        let s = Settings::discover(Some(&path))?;
        assert_eq!(s.paths.models_dir, PathBuf::from("/opt/models"));
        assert_eq!(s.paths.output_dir, PathBuf::from("subtitles"));
        Ok(())
    }

    #[test]
    fn serialized_defaults_parse_back() -> anyhow::Result<()> {
        let text = Settings::default().to_toml()?;
        assert_eq!(Settings::from_toml(&text)?, Settings::default());
        Ok(())
    }
}
