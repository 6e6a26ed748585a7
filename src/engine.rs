use crate::error::OcrError;
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Axis-aligned bounding box of a recognized region, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_y(&self) -> f32 {
        0.5 * (self.top + self.bottom)
    }
}

/// One fragment of text returned by the engine for a region of an image
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub text: String,
    pub bounds: Bounds,
}

/// Trait that all recognition engines must implement
pub trait Recognizer: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs")
    fn name(&self) -> &'static str;

    /// Recognize every text region in an RGB image, in reading order
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextRegion>, OcrError>;
}

/// Languages and device preference the engine is built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub languages: Vec<String>,
    pub use_accelerator: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            languages: vec!["vi".to_string(), "en".to_string()],
            use_accelerator: true,
        }
    }
}

type EngineFactory = dyn Fn(&EngineSettings) -> Result<Arc<dyn Recognizer>, OcrError> + Send + Sync;

/// Shared handle to the recognition engine.
///
/// The engine is built at most once, on the blocking pool, the first time it
/// is requested. Concurrent first callers wait on that single construction and
/// then share the same instance. Settings are fixed when the handle is created.
pub struct EngineHandle {
    inner: Arc<EngineCell>,
}

struct EngineCell {
    settings: EngineSettings,
    factory: Box<EngineFactory>,
    engine: OnceCell<Arc<dyn Recognizer>>,
}

impl EngineCell {
    async fn get_or_build(self: Arc<Self>) -> Result<Arc<dyn Recognizer>, OcrError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let cell = Arc::clone(&self);

                tokio::task::spawn_blocking(move || {
                    tracing::info!(
                        "Initializing recognition engine (languages: {}, accelerator: {})",
                        cell.settings.languages.join(","),
                        cell.settings.use_accelerator
                    );
                    (cell.factory)(&cell.settings)
                })
                .await
                .map_err(|e| {
                    OcrError::InitializationError(format!("Engine construction panicked: {}", e))
                })?
            })
            .await?;

        Ok(Arc::clone(engine))
    }
}

impl EngineHandle {
    pub fn new<F>(settings: EngineSettings, factory: F) -> Self
    where
        F: Fn(&EngineSettings) -> Result<Arc<dyn Recognizer>, OcrError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EngineCell {
                settings,
                factory: Box::new(factory),
                engine: OnceCell::new(),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Whether the engine has been constructed yet
    pub fn is_ready(&self) -> bool {
        self.inner.engine.initialized()
    }

    /// Get the engine, constructing it on first use.
    ///
    /// Construction runs in its own task, so a caller that goes away mid-build
    /// leaves the build running for the next caller to join.
    pub async fn get(&self) -> Result<Arc<dyn Recognizer>, OcrError> {
        if let Some(engine) = self.inner.engine.get() {
            return Ok(Arc::clone(engine));
        }

        tokio::spawn(Arc::clone(&self.inner).get_or_build())
            .await
            .map_err(|e| {
                OcrError::InitializationError(format!("Engine construction task failed: {}", e))
            })?
    }

    /// Get the engine for a caller asking for specific settings.
    ///
    /// The handle cannot be reconfigured: a request for different settings is
    /// served by the engine built with the original ones.
    pub async fn get_for(
        &self,
        requested: &EngineSettings,
    ) -> Result<Arc<dyn Recognizer>, OcrError> {
        if requested != self.settings() {
            tracing::warn!(
                "Ignoring engine settings {:?}; engine is configured with {:?}",
                requested,
                self.settings()
            );
        }
        self.get().await
    }
}
