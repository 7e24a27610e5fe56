use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ApiError, AppState, Caller, Operator};
use crate::models::{
    AudioFile, GeneratedAudio, NewPreset, ProcessedVoiceResult, QuotaSnapshot, VoicePreset,
    VoiceTransformation,
};
use crate::services::{AudioUpdate, GenerateRequest};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub audio_id: String,
    #[serde(default, alias = "effects")]
    pub transformation: VoiceTransformation,
    #[serde(default)]
    pub preset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub name: Option<String>,
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn generate(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<GeneratedAudio> {
    Ok(Json(state.library.generate(&user_id, request).await?))
}

pub async fn transform(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(request): Json<TransformRequest>,
) -> ApiResult<ProcessedVoiceResult> {
    let result = state
        .library
        .transform(
            &user_id,
            &request.audio_id,
            &request.transformation,
            request.preset_id.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

/// Raw audio body; name and format come from the query string.
pub async fn upload(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<AudioFile> {
    let name = params.name.unwrap_or_default();
    let file = state
        .library
        .upload(&user_id, body, &name, &params.format)
        .await?;
    Ok(Json(file))
}

pub async fn list_audio(State(state): State<AppState>, Caller(user_id): Caller) -> ApiResult<Vec<AudioFile>> {
    Ok(Json(state.library.list(&user_id).await?))
}

pub async fn update_audio(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(audio_id): Path<String>,
    Json(update): Json<AudioUpdate>,
) -> ApiResult<AudioFile> {
    Ok(Json(state.library.rename(&user_id, &audio_id, update).await?))
}

pub async fn delete_audio(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(audio_id): Path<String>,
) -> ApiResult<SuccessResponse> {
    state.library.delete(&user_id, &audio_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn quota(State(state): State<AppState>, Caller(user_id): Caller) -> ApiResult<QuotaSnapshot> {
    Ok(Json(state.quota.remaining(&user_id).await?))
}

pub async fn invalidate_cache(
    State(state): State<AppState>,
    _operator: Operator,
    Path(user_id): Path<String>,
) -> ApiResult<Value> {
    let removed = state.cache.invalidate_user(&user_id).await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

pub async fn list_presets(State(state): State<AppState>, Caller(user_id): Caller) -> ApiResult<Vec<VoicePreset>> {
    Ok(Json(state.presets.list_own(&user_id).await?))
}

pub async fn public_presets(State(state): State<AppState>, Caller(_): Caller) -> ApiResult<Vec<VoicePreset>> {
    Ok(Json(state.presets.list_public().await?))
}

pub async fn create_preset(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(preset): Json<NewPreset>,
) -> ApiResult<VoicePreset> {
    Ok(Json(state.presets.create(&user_id, preset).await?))
}

pub async fn get_preset(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(preset_id): Path<String>,
) -> ApiResult<VoicePreset> {
    Ok(Json(state.presets.get(&user_id, &preset_id).await?))
}

pub async fn update_preset(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(preset_id): Path<String>,
    Json(preset): Json<NewPreset>,
) -> ApiResult<VoicePreset> {
    Ok(Json(state.presets.update(&user_id, &preset_id, preset).await?))
}

pub async fn delete_preset(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(preset_id): Path<String>,
) -> ApiResult<SuccessResponse> {
    state.presets.delete(&user_id, &preset_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") | Some("aac") => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// Public URLs of the local object storage.
pub async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response, ApiError> {
    match state.files.read_path(&path).await? {
        Some(data) => Ok(([(header::CONTENT_TYPE, content_type(&path))], data).into_response()),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "File not found")),
    }
}
