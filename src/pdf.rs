//! PDF rasterization
//!
//! Pages are rendered one at a time, in order, at a fixed magnification. A
//! document stays open only while its pages are being visited and is closed
//! when the handle is dropped, on success and on every error path.

use crate::error::OcrError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Pages are rendered at twice their native size to help with small text
pub const RENDER_SCALE: f32 = 2.0;

/// Raw samples of a rendered page
#[derive(Debug, Clone)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub samples: Vec<u8>,
}

impl Pixmap {
    /// Convert to a 3-channel image, discarding alpha when present
    pub fn into_rgb(self) -> Result<RgbImage, OcrError> {
        let pixels = self.width as usize * self.height as usize;
        let expected = pixels * self.channels as usize;
        if self.samples.len() != expected {
            return Err(OcrError::Processing(format!(
                "Pixmap has {} bytes, expected {} for {}x{}x{}",
                self.samples.len(),
                expected,
                self.width,
                self.height,
                self.channels
            )));
        }

        let rgb = match self.channels {
            3 => self.samples,
            4 => self
                .samples
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            n => {
                return Err(OcrError::Processing(format!(
                    "Unsupported pixmap layout: {} channels",
                    n
                )))
            }
        };

        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| OcrError::Processing("Invalid RGB pixmap data".to_string()))
    }
}

/// An open document. Dropping it closes the document.
pub trait RasterDocument {
    fn page_count(&self) -> usize;

    fn render_page(&self, index: usize, scale: f32) -> Result<Pixmap, OcrError>;
}

/// Opens PDF documents from bytes
pub trait Rasterizer: Send + Sync {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterDocument + 'a>, OcrError>;
}

/// Readers accept the `%PDF-` marker anywhere in the first kilobyte
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Cheap check that the bytes look like a PDF, before any engine work
pub fn ensure_pdf_header(bytes: &[u8]) -> Result<(), OcrError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(OcrError::InvalidDocument("missing %PDF- header".to_string()))
    }
}

/// Visit every page of a PDF in order as an RGB image.
///
/// Fails with `InvalidDocument` for unreadable input and `EmptyDocument` when
/// there are no pages. The first error from `visit` stops the walk.
pub fn for_each_page<F>(
    rasterizer: &dyn Rasterizer,
    bytes: &[u8],
    mut visit: F,
) -> Result<(), OcrError>
where
    F: FnMut(usize, usize, RgbImage) -> Result<(), OcrError>,
{
    let document = rasterizer.open(bytes)?;
    let page_count = document.page_count();
    if page_count == 0 {
        return Err(OcrError::EmptyDocument);
    }

    for index in 0..page_count {
        let image = document.render_page(index, RENDER_SCALE)?.into_rgb()?;
        visit(index, page_count, image)?;
    }

    Ok(())
}

/// Rasterizer backed by the pdfium library.
///
/// The library is bound on first use so the server can start (and answer
/// health checks) on hosts where pdfium is missing.
pub struct PdfiumRasterizer {
    lib_dir: Option<PathBuf>,
    pdfium: OnceLock<Pdfium>,
    bind_lock: Mutex<()>,
}

impl PdfiumRasterizer {
    pub fn new(lib_dir: Option<PathBuf>) -> Self {
        Self {
            lib_dir,
            pdfium: OnceLock::new(),
            bind_lock: Mutex::new(()),
        }
    }

    fn pdfium(&self) -> Result<&Pdfium, OcrError> {
        if let Some(pdfium) = self.pdfium.get() {
            return Ok(pdfium);
        }

        let _guard = self
            .bind_lock
            .lock()
            .map_err(|_| OcrError::Internal("pdfium bind lock poisoned".to_string()))?;

        if let Some(pdfium) = self.pdfium.get() {
            return Ok(pdfium);
        }

        let lib_dir = self
            .lib_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().to_string())
            .unwrap_or_else(|| "./".to_string());

        let bindings =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&lib_dir))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| {
                    OcrError::Processing(format!("Failed to bind pdfium library: {}", e))
                })?;

        tracing::info!("pdfium library bound");

        let _ = self.pdfium.set(Pdfium::new(bindings));
        self.pdfium
            .get()
            .ok_or_else(|| OcrError::Internal("Failed to cache pdfium bindings".to_string()))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterDocument + 'a>, OcrError> {
        let document = self
            .pdfium()?
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| OcrError::InvalidDocument(e.to_string()))?;

        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<Pixmap, OcrError> {
        let page = self
            .document
            .pages()
            .get(index as PdfPageIndex)
            .map_err(|e| {
                OcrError::Processing(format!("Failed to load page {}: {}", index + 1, e))
            })?;

        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
            .map_err(|e| {
                OcrError::Processing(format!("Failed to render page {}: {}", index + 1, e))
            })?;

        Ok(Pixmap {
            width: bitmap.width() as u32,
            height: bitmap.height() as u32,
            channels: 4,
            samples: bitmap.as_rgba_bytes(),
        })
    }
}
