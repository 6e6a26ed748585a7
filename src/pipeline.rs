//! Request-to-text pipeline: decode, recognize each unit in order, aggregate
//!
//! Recognition is CPU bound, so every unit runs on the blocking pool. Units are
//! awaited one at a time and the first failure aborts the whole request.

use crate::decode;
use crate::engine::Recognizer;
use crate::error::OcrError;
use crate::paragraph::group_paragraphs;
use crate::pdf::{self, Rasterizer};
use axum::body::Bytes;
use image::RgbImage;
use std::sync::Arc;

/// How region texts are turned into fragments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizeOptions {
    pub paragraph: bool,
    pub width_threshold: f32,
    pub height_threshold: f32,
}

impl RecognizeOptions {
    /// Paragraph-merged fragments, used for uploaded images
    pub const PARAGRAPHS: Self = Self {
        paragraph: true,
        width_threshold: 0.2,
        height_threshold: 0.2,
    };

    /// One fragment per detected region, used for PDF pages
    pub const RAW: Self = Self {
        paragraph: false,
        width_threshold: 0.0,
        height_threshold: 0.0,
    };
}

/// Image payload as received
pub enum ImageData {
    /// Raw file bytes from a multipart upload
    Upload(Bytes),
    /// Base64 string, optionally with a `<mime>;base64,` header
    Base64(String),
}

/// One image to recognize, named for error reporting
pub struct ImageUnit {
    pub name: String,
    pub data: ImageData,
}

/// Run the engine on one image and return its fragments in reading order
pub fn recognize_unit(
    engine: &dyn Recognizer,
    image: &RgbImage,
    options: &RecognizeOptions,
) -> Result<Vec<String>, OcrError> {
    let regions = engine.recognize(image).map_err(|e| match e {
        OcrError::Recognition { .. } => e,
        other => OcrError::Recognition {
            unit: "image".to_string(),
            message: other.to_string(),
        },
    })?;

    tracing::debug!(
        "{} found {} regions in {}x{} image",
        engine.name(),
        regions.len(),
        image.width(),
        image.height()
    );

    if options.paragraph {
        Ok(group_paragraphs(
            &regions,
            options.width_threshold,
            options.height_threshold,
        ))
    } else {
        Ok(regions.into_iter().map(|region| region.text).collect())
    }
}

/// Fragments of one unit, separated by a single space
pub fn join_fragments(fragments: &[String]) -> String {
    fragments.join(" ")
}

/// Per-image texts, separated by a single space and trimmed
pub fn join_image_texts(texts: &[String]) -> String {
    texts.join(" ").trim().to_string()
}

/// Per-page texts, concatenated without a separator and trimmed
pub fn join_page_texts(texts: &[String]) -> String {
    texts.concat().trim().to_string()
}

/// Recognize images in submission order and join their texts
pub async fn recognize_images(
    engine: Arc<dyn Recognizer>,
    units: Vec<ImageUnit>,
) -> Result<String, OcrError> {
    let total = units.len();
    let mut texts = Vec::with_capacity(total);

    for (idx, unit) in units.into_iter().enumerate() {
        tracing::info!("Processing image {}/{} - {}", idx + 1, total, unit.name);

        let name = unit.name.clone();
        let engine = Arc::clone(&engine);
        let text = tokio::task::spawn_blocking(move || recognize_image(engine.as_ref(), unit))
            .await
            .map_err(|e| OcrError::Internal(format!("OCR task failed: {}", e)))?
            .map_err(|e| {
                tracing::error!("OCR failed on image {}: {}", name, e);
                e
            })?;

        texts.push(text);
    }

    Ok(join_image_texts(&texts))
}

fn recognize_image(engine: &dyn Recognizer, unit: ImageUnit) -> Result<String, OcrError> {
    let image = match &unit.data {
        // Unreadable uploads fail as OCR errors on that file
        ImageData::Upload(bytes) => {
            decode::decode_bytes(bytes).map_err(|e| e.in_unit(&unit.name))?
        }
        ImageData::Base64(payload) => decode::decode_base64(payload)?,
    };

    let fragments = recognize_unit(engine, &image, &RecognizeOptions::PARAGRAPHS)
        .map_err(|e| e.in_unit(&unit.name))?;

    Ok(join_fragments(&fragments))
}

/// Rasterize a PDF and recognize its pages in order
pub async fn recognize_pdf(
    engine: Arc<dyn Recognizer>,
    rasterizer: Arc<dyn Rasterizer>,
    name: String,
    bytes: Bytes,
) -> Result<String, OcrError> {
    tokio::task::spawn_blocking(move || {
        let mut pages = Vec::new();

        pdf::for_each_page(rasterizer.as_ref(), &bytes, |index, total, image| {
            tracing::info!("Processing page {}/{} of {}", index + 1, total, name);

            let fragments = recognize_unit(engine.as_ref(), &image, &RecognizeOptions::RAW)
                .map_err(|e| e.in_unit(&format!("page {} of {}", index + 1, name)))?;
            pages.push(join_fragments(&fragments));

            tracing::info!("Finished page {}/{}", index + 1, total);
            Ok(())
        })?;

        Ok(join_page_texts(&pages))
    })
    .await
    .map_err(|e| OcrError::Internal(format!("PDF task failed: {}", e)))?
}
