use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use bookcover_http::error::AppError;

use super::download::DownloadHelper;
use super::models::{
    CoverFormPatch, FieldIssue, FormField, GenerationResult, Genre, ValidationError,
    ART_STYLE_SUGGESTIONS, MOOD_SUGGESTIONS,
};
use super::workspace::{CoverWorkspace, SubmitError, WorkspaceView};

/// Shared state behind every covers route.
#[derive(Clone)]
pub struct CoversState {
    pub workspace: Arc<CoverWorkspace>,
    pub downloads: DownloadHelper,
}

pub fn router(state: CoversState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/options", get(options))
        .route("/form", get(get_form).patch(patch_form).delete(reset_form))
        .route("/form/{field}", put(put_field))
        .route("/prompt", get(preview_prompt))
        .route("/generate", post(generate))
        .route("/regenerate", post(regenerate))
        .route("/download", get(download))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    value: String,
}

#[derive(Debug, Serialize)]
struct PromptPreview {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GeneratedCover {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

#[derive(Debug, Serialize)]
struct FormOptions {
    genres: Vec<&'static str>,
    moods: &'static [&'static str],
    art_styles: &'static [&'static str],
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "covers module is healthy"
}

async fn options() -> Json<FormOptions> {
    Json(FormOptions {
        genres: Genre::ALL.iter().map(Genre::as_str).collect(),
        moods: &MOOD_SUGGESTIONS,
        art_styles: &ART_STYLE_SUGGESTIONS,
    })
}

async fn get_form(State(state): State<CoversState>) -> Json<WorkspaceView> {
    Json(state.workspace.view().await)
}

async fn patch_form(
    State(state): State<CoversState>,
    payload: Result<Json<CoverFormPatch>, JsonRejection>,
) -> Result<Json<WorkspaceView>, AppError> {
    let Json(patch) = payload?;
    state.workspace.apply(patch).await;
    Ok(Json(state.workspace.view().await))
}

async fn put_field(
    State(state): State<CoversState>,
    Path(field): Path<String>,
    payload: Result<Json<FieldValue>, JsonRejection>,
) -> Result<Json<WorkspaceView>, AppError> {
    let field: FormField = field.parse().map_err(AppError::bad_request)?;
    let Json(body) = payload?;
    state.workspace.set_field(field, body.value).await;
    Ok(Json(state.workspace.view().await))
}

async fn reset_form(State(state): State<CoversState>) -> Json<WorkspaceView> {
    state.workspace.reset().await;
    Json(state.workspace.view().await)
}

async fn preview_prompt(State(state): State<CoversState>) -> Result<Json<PromptPreview>, AppError> {
    let prompt = state.workspace.preview().await.map_err(validation_error)?;
    Ok(Json(PromptPreview { prompt }))
}

async fn generate(State(state): State<CoversState>) -> Result<Json<GeneratedCover>, AppError> {
    run_attempt(&state).await
}

async fn regenerate(State(state): State<CoversState>) -> Result<Json<GeneratedCover>, AppError> {
    run_attempt(&state).await
}

/// The attempt runs on its own task so it still finishes and records its
/// result when the request is dropped (client gone, timeout).
async fn run_attempt(state: &CoversState) -> Result<Json<GeneratedCover>, AppError> {
    let workspace = state.workspace.clone();
    let attempt = tokio::spawn(async move { workspace.regenerate().await })
        .await
        .map_err(|err| AppError::Internal(anyhow::anyhow!("generation task failed: {}", err)))?;

    match attempt {
        Ok(GenerationResult::Image { image_url }) => Ok(Json(GeneratedCover {
            image_url: image_url.as_str().to_string(),
        })),
        Ok(GenerationResult::Failed { message }) => {
            Err(AppError::upstream("generation_failed", message))
        }
        Err(SubmitError::Invalid(err)) => Err(validation_error(err)),
        Err(SubmitError::InProgress) => Err(AppError::conflict(
            "generation_in_progress",
            SubmitError::InProgress.to_string(),
        )),
    }
}

async fn download(State(state): State<CoversState>) -> Result<Response, AppError> {
    let image = state
        .workspace
        .result()
        .await
        .and_then(|result| result.image().cloned())
        .ok_or_else(|| AppError::not_found("no generated cover to download"))?;
    let title = state.workspace.form().await.title;

    match state.downloads.fetch(&image).await {
        Ok(bytes) => {
            let file_name = state.downloads.file_name(&title);
            Ok((
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
                    (header::CONTENT_DISPOSITION, content_disposition(&file_name)),
                ],
                bytes,
            )
                .into_response())
        }
        Err(err) => {
            tracing::warn!(error = %err, image = %image, "download failed, redirecting to the image");
            Ok(Redirect::temporary(image.as_str()).into_response())
        }
    }
}

fn validation_error(err: ValidationError) -> AppError {
    let message = err.to_string();
    let details = err.issues.iter().map(issue_detail).collect();
    AppError::validation(details, message)
}

fn issue_detail(issue: &FieldIssue) -> serde_json::Value {
    json!({ "field": issue.field, "problem": issue.problem })
}

/// `attachment` header with an ASCII fallback plus the UTF-8 name.
fn content_disposition(file_name: &str) -> HeaderValue {
    let ascii: String = file_name
        .chars()
        .map(|ch| if ch.is_ascii() && !ch.is_ascii_control() { ch } else { '_' })
        .collect();
    let encoded: String = file_name
        .bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (byte as char).to_string()
            }
            _ => format!("%{:02X}", byte),
        })
        .collect();

    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
