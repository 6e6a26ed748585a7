use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("No files were uploaded (check the form field names)")]
    NoFiles,

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid PDF file: {0}")]
    InvalidDocument(String),

    #[error("PDF has 0 pages")]
    EmptyDocument,

    #[error("Only PDF files are accepted, got '{0}'")]
    WrongFileType(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Request too large (max: {max} bytes)")]
    PayloadTooLarge { max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("OCR failed on {unit}: {message}")]
    Recognition { unit: String, message: String },

    #[error("Failed to process document: {0}")]
    Processing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Attach the failing unit (file name or page) to an engine error
    pub fn in_unit(self, unit: &str) -> Self {
        match self {
            OcrError::Recognition { message, .. } => OcrError::Recognition {
                unit: unit.to_string(),
                message,
            },
            OcrError::Decode(message) => OcrError::Recognition {
                unit: unit.to_string(),
                message: format!("failed to decode image: {}", message),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OcrError::Decode(_)
            | OcrError::NoFiles
            | OcrError::MissingFile
            | OcrError::InvalidDocument(_)
            | OcrError::EmptyDocument
            | OcrError::WrongFileType(_)
            | OcrError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OcrError::ImageTooLarge { .. } | OcrError::PayloadTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            OcrError::InitializationError(_)
            | OcrError::Recognition { .. }
            | OcrError::Processing(_)
            | OcrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            OcrError::InitializationError(_) => "INIT_ERROR",
            OcrError::Decode(_) => "DECODE_ERROR",
            OcrError::NoFiles => "NO_FILES",
            OcrError::MissingFile => "MISSING_FILE",
            OcrError::InvalidDocument(_) => "INVALID_DOCUMENT",
            OcrError::EmptyDocument => "EMPTY_DOCUMENT",
            OcrError::WrongFileType(_) => "WRONG_FILE_TYPE",
            OcrError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            OcrError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            OcrError::InvalidRequest(_) => "INVALID_REQUEST",
            OcrError::Recognition { .. } => "RECOGNITION_ERROR",
            OcrError::Processing(_) => "PROCESSING_ERROR",
            OcrError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}
