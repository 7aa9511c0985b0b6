use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::{export::ExportError, gemini::GenerationError, store::StoreError};

#[derive(Debug, Error)]
pub enum ComicError {
    #[error("no Gemini API key configured")]
    MissingCredential,
    #[error("generate a character first")]
    MissingCharacterReference,
    #[error("describe your character first")]
    EmptyCharacterDescription,
    #[error("describe the scene for your comic first")]
    EmptySceneDescription,
    #[error("panel count must be between 1 and {max}, got {requested}")]
    InvalidPanelCount { requested: usize, max: usize },
    #[error("panel {index} is out of range for a {len}-panel comic")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("stored {what} is not a valid image data URL")]
    InvalidImageData { what: &'static str },
    #[error("another generation is already running")]
    GenerationInProgress,
    #[error("run cancelled before panel {}", .index + 1)]
    Cancelled { index: usize },
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ComicResult<T> = Result<T, ComicError>;

impl ComicError {
    /// Stable machine-readable name used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ComicError::MissingCredential => "missing_credential",
            ComicError::MissingCharacterReference => "missing_character_reference",
            ComicError::EmptyCharacterDescription => "empty_character_description",
            ComicError::EmptySceneDescription => "empty_scene_description",
            ComicError::InvalidPanelCount { .. } => "invalid_panel_count",
            ComicError::IndexOutOfRange { .. } => "index_out_of_range",
            ComicError::InvalidImageData { .. } => "invalid_image_data",
            ComicError::GenerationInProgress => "generation_in_progress",
            ComicError::Cancelled { .. } => "cancelled",
            ComicError::Generation(GenerationError::RequestFailed(_)) => "request_failed",
            ComicError::Generation(GenerationError::NoImageProduced) => "no_image_produced",
            ComicError::Export(ExportError::EmptySequence) => "empty_sequence",
            ComicError::Export(_) => "export_failed",
            ComicError::Store(_) => "store_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ComicError::MissingCredential
            | ComicError::MissingCharacterReference
            | ComicError::EmptyCharacterDescription
            | ComicError::EmptySceneDescription
            | ComicError::InvalidPanelCount { .. }
            | ComicError::Export(ExportError::EmptySequence) => StatusCode::BAD_REQUEST,
            ComicError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
            ComicError::GenerationInProgress | ComicError::Cancelled { .. } => StatusCode::CONFLICT,
            ComicError::Generation(_) => StatusCode::BAD_GATEWAY,
            ComicError::InvalidImageData { .. } | ComicError::Export(_) | ComicError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ComicError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.kind(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
