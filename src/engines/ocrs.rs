//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use crate::engine::{Bounds, EngineSettings, Recognizer, TextRegion};
use crate::error::OcrError;
use image::RgbImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

const DETECTION_MODEL_FILE: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILE: &str = "text-recognition.rten";

/// Recognizer wrapping the ocrs library
pub struct OcrsRecognizer {
    engine: OcrsOcrEngine,
}

impl OcrsRecognizer {
    /// Load the models (downloading them if needed) and build the engine
    pub fn new(settings: &EngineSettings, model_dir: Option<PathBuf>) -> Result<Self, OcrError> {
        if settings.use_accelerator {
            tracing::info!("Accelerator requested but ocrs runs on CPU; continuing on CPU");
        }
        tracing::info!(
            "Configured languages: {} (ocrs models cover Latin script)",
            settings.languages.join(", ")
        );

        let model_dir = resolve_model_dir(model_dir);
        std::fs::create_dir_all(&model_dir).map_err(|e| {
            OcrError::InitializationError(format!("Failed to create model directory: {}", e))
        })?;

        let detection_model_path =
            ensure_model_downloaded(DETECTION_MODEL_URL, &model_dir, DETECTION_MODEL_FILE)?;
        let recognition_model_path =
            ensure_model_downloaded(RECOGNITION_MODEL_URL, &model_dir, RECOGNITION_MODEL_FILE)?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self { engine })
    }
}

impl Recognizer for OcrsRecognizer {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextRegion>, OcrError> {
        let img_source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| recognition_error(format!("Failed to create image source: {}", e)))?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| recognition_error(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| recognition_error(format!("Failed to detect words: {}", e)))?;

        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| recognition_error(format!("Failed to recognize text: {}", e)))?;

        let regions = line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .filter_map(|line| {
                let text = line
                    .words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.trim().is_empty() {
                    return None;
                }

                let rect = line.bounding_rect();
                Some(TextRegion {
                    text,
                    bounds: Bounds {
                        left: rect.left() as f32,
                        top: rect.top() as f32,
                        right: rect.right() as f32,
                        bottom: rect.bottom() as f32,
                    },
                })
            })
            .collect();

        Ok(regions)
    }
}

fn recognition_error(message: String) -> OcrError {
    OcrError::Recognition {
        unit: "image".to_string(),
        message,
    }
}

/// Model directory: explicit override, else the user cache directory
fn resolve_model_dir(model_dir: Option<PathBuf>) -> PathBuf {
    model_dir.unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ocr-text-server")
    })
}

/// Ensure model is downloaded and return its path
fn ensure_model_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OcrError> {
    let model_path = dir.join(filename);

    if model_path.exists() {
        tracing::info!("Using cached model from {:?}", model_path);
        return Ok(model_path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);

    // Download next to the target so an interrupted transfer never looks cached
    let partial_path = dir.join(format!("{}.part", filename));
    download_file(url, &partial_path)?;
    std::fs::rename(&partial_path, &model_path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to move model into place: {}", e))
    })?;

    tracing::info!("Downloaded {} to {:?}", filename, model_path);
    Ok(model_path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download model: {}", e)))?;

    let mut file = File::create(path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create model file: {}", e))
    })?;

    let mut reader = response.into_body().into_reader();
    std::io::copy(&mut reader, &mut file)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write model file: {}", e)))?;

    Ok(())
}
