use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/llm", get(current_text_generator))
        .route("/llm/", get(current_text_generator))
        .route("/llm/list", get(list_text_generators))
        .route("/llm/switch", put(switch_text_generator))
        .route("/tts", get(current_speech_synthesizer))
        .route("/tts/", get(current_speech_synthesizer))
        .route("/tts/list", get(list_speech_synthesizers))
        .route("/tts/switch", put(switch_speech_synthesizer))
}

#[derive(Debug, Serialize)]
pub struct CurrentModelResponse {
    pub current_model: String,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchModelRequest {
    pub model_name: String,
}

async fn current_text_generator(State(state): State<AppState>) -> Json<CurrentModelResponse> {
    Json(CurrentModelResponse {
        current_model: state.narrator.models().text_generators().current_name(),
    })
}

async fn list_text_generators(State(state): State<AppState>) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        models: state.narrator.models().text_generators().names(),
    })
}

async fn switch_text_generator(
    State(state): State<AppState>,
    payload: Result<Json<SwitchModelRequest>, JsonRejection>,
) -> Result<Json<CurrentModelResponse>, ApiError> {
    let Json(request) = payload?;
    let current_model = state
        .narrator
        .models()
        .switch_text_generator(&request.model_name)
        .await?;
    Ok(Json(CurrentModelResponse { current_model }))
}

async fn current_speech_synthesizer(State(state): State<AppState>) -> Json<CurrentModelResponse> {
    Json(CurrentModelResponse {
        current_model: state.narrator.models().speech_synthesizers().current_name(),
    })
}

async fn list_speech_synthesizers(State(state): State<AppState>) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        models: state.narrator.models().speech_synthesizers().names(),
    })
}

async fn switch_speech_synthesizer(
    State(state): State<AppState>,
    payload: Result<Json<SwitchModelRequest>, JsonRejection>,
) -> Result<Json<CurrentModelResponse>, ApiError> {
    let Json(request) = payload?;
    let current_model = state
        .narrator
        .models()
        .switch_speech_synthesizer(&request.model_name)
        .await?;
    Ok(Json(CurrentModelResponse { current_model }))
}
