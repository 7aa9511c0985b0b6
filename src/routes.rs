use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::ComicResult,
    models::{
        CharacterView, GenerateCharacterRequest, GenerateComicRequest, ImagePayload, PanelView,
        PreferencesUpdate, RunState, SessionView, StylePreset,
    },
    studio::ComicStudio,
};

#[derive(Clone)]
pub struct AppState {
    pub studio: Arc<ComicStudio>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/styles", get(list_styles))
        .route("/api/session", get(get_session).patch(update_session))
        .route("/api/character", post(generate_character))
        .route("/api/character/image", get(character_image))
        .route("/api/comic", post(generate_comic))
        .route("/api/comic/status", get(comic_status))
        .route("/api/comic/cancel", post(cancel_comic))
        .route("/api/comic/panels/:index/image", get(panel_image))
        .route("/api/comic/panels/:index/regenerate", post(regenerate_panel))
        .route("/api/comic/export", get(export_comic))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn list_styles() -> Json<Vec<&'static str>> {
    Json(StylePreset::ALL.iter().map(StylePreset::label).collect())
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.studio.session_view())
}

pub async fn update_session(
    State(state): State<AppState>,
    Json(body): Json<PreferencesUpdate>,
) -> ComicResult<Json<SessionView>> {
    state.studio.update_preferences(body).map(Json)
}

// Generation runs on its own task; a dropped connection must not abandon it.
pub async fn generate_character(
    State(state): State<AppState>,
    Json(body): Json<GenerateCharacterRequest>,
) -> Response {
    tracing::info!("🧑‍🎨 Character generation requested");
    let studio = state.studio.clone();
    match tokio::spawn(async move { studio.generate_character(body).await }).await {
        Ok(result) => result.map(|c: CharacterView| Json(c)).into_response(),
        Err(e) => task_failed(e),
    }
}

pub async fn character_image(State(state): State<AppState>) -> Response {
    match state.studio.character_image() {
        Some(image) => image_response(image),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn generate_comic(
    State(state): State<AppState>,
    Json(body): Json<GenerateComicRequest>,
) -> Response {
    tracing::info!("🚀 Comic generation requested ({:?} panels)", body.panel_count);
    let studio = state.studio.clone();
    match tokio::spawn(async move { studio.generate_all(body).await }).await {
        Ok(result) => result.map(|panels: Vec<PanelView>| Json(panels)).into_response(),
        Err(e) => task_failed(e),
    }
}

pub async fn comic_status(State(state): State<AppState>) -> Json<RunState> {
    Json(state.studio.run_state())
}

pub async fn cancel_comic(State(state): State<AppState>) -> Response {
    let accepted = state.studio.cancel();
    let status = if accepted { StatusCode::ACCEPTED } else { StatusCode::OK };
    (status, Json(json!({ "cancelRequested": accepted }))).into_response()
}

pub async fn panel_image(Path(index): Path<usize>, State(state): State<AppState>) -> Response {
    match state.studio.panel_image(index) {
        Ok(image) => image_response(image),
        Err(e) => e.into_response(),
    }
}

pub async fn regenerate_panel(Path(index): Path<usize>, State(state): State<AppState>) -> Response {
    tracing::info!("🔄 Regeneration requested for panel {}", index.saturating_add(1));
    let studio = state.studio.clone();
    match tokio::spawn(async move { studio.regenerate_panel(index).await }).await {
        Ok(result) => result.map(|panel: PanelView| Json(panel)).into_response(),
        Err(e) => task_failed(e),
    }
}

pub async fn export_comic(State(state): State<AppState>) -> Response {
    match state.studio.export() {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"comic.zip\""),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("❌ Export failed: {}", e);
            e.into_response()
        }
    }
}

fn image_response(image: ImagePayload) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, image.mime_type)], image.bytes).into_response()
}

fn task_failed(e: tokio::task::JoinError) -> Response {
    tracing::error!("❌ Generation task aborted: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "task_failed", "message": e.to_string() })),
    )
        .into_response()
}
