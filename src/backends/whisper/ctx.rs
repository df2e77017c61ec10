use std::path::Path;

use whisper_rs::{WhisperContext, WhisperContextParameters};

use super::logging::init_whisper_logging;
use crate::{Error, Result};

/// Load a Whisper model and return an initialized `WhisperContext`.
pub(super) fn get_context(model_path: &Path) -> Result<WhisperContext> {
    init_whisper_logging();

    let path = model_path.to_str().ok_or_else(|| {
        Error::ModelNotFound(format!(
            "model path is not valid UTF-8: '{}'",
            model_path.display()
        ))
    })?;

    let ctx_params = WhisperContextParameters::default();
    WhisperContext::new_with_params(path, ctx_params).map_err(|e| {
        Error::ModelNotFound(format!("failed to load model from '{path}': {e}"))
    })
}
