//! Recognition engine implementations
//!
//! This module contains implementations of the Recognizer trait. Engines are
//! conditionally compiled based on feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

use crate::engine::{EngineSettings, Recognizer};
use crate::error::OcrError;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the configured recognition engine.
///
/// Called once per process through the engine handle.
#[cfg(feature = "engine-ocrs")]
pub fn build(
    settings: &EngineSettings,
    model_dir: Option<PathBuf>,
) -> Result<Arc<dyn Recognizer>, OcrError> {
    tracing::info!("Building ocrs engine...");
    let engine = ocrs::OcrsRecognizer::new(settings, model_dir)?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "engine-ocrs"))]
pub fn build(
    _settings: &EngineSettings,
    _model_dir: Option<PathBuf>,
) -> Result<Arc<dyn Recognizer>, OcrError> {
    Err(OcrError::InitializationError(
        "No OCR engines available. Build with --features engine-ocrs".to_string(),
    ))
}
