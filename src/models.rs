//! Model name to weights-file resolution.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// whisper.cpp model names this crate knows how to locate.
pub const KNOWN_MODELS: &[&str] = &[
    "tiny.en",
    "tiny",
    "tiny-q5_1",
    "tiny.en-q5_1",
    "base.en",
    "base",
    "base-q5_1",
    "base.en-q5_1",
    "small.en",
    "small.en-tdrz",
    "small",
    "small-q5_1",
    "small.en-q5_1",
    "medium",
    "medium.en",
    "medium-q5_0",
    "medium.en-q5_0",
    "large-v1",
    "large-v2",
    "large-v3",
    "large-v3-turbo",
    "large",
    "large-q5_0",
];

pub const DEFAULT_MODEL: &str = "base";

/// Maps a model name to a local weights file.
pub trait ModelResolver: Send + Sync {
    fn resolve(&self, model_name: &str) -> Result<PathBuf>;
}

/// Looks up `ggml-{name}.bin` inside a models directory.
///
/// Weights are expected to be present already; fetching them is out of scope.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn is_known(model_name: &str) -> bool {
        KNOWN_MODELS.contains(&model_name)
    }

    pub fn file_name(model_name: &str) -> String {
        format!("ggml-{model_name}.bin")
    }

    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models_dir.join(Self::file_name(model_name))
    }

    /// Known models and whether their weights are present locally.
    pub fn list(&self) -> Vec<(&'static str, bool)> {
        KNOWN_MODELS
            .iter()
            .map(|name| (*name, self.model_path(name).is_file()))
            .collect()
    }
}

impl ModelResolver for ModelManager {
    fn resolve(&self, model_name: &str) -> Result<PathBuf> {
        if !Self::is_known(model_name) {
            return Err(Error::ModelNotFound(format!(
                "unknown model '{model_name}' (available: {})",
                KNOWN_MODELS.join(", ")
            )));
        }

        let path = self.model_path(model_name);
        if !path.is_file() {
            return Err(Error::ModelNotFound(format!(
                "weights for '{model_name}' not found at '{}'",
                path.display()
            )));
        }
        Ok(path)
    }
}
