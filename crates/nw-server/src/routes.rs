use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use nw_core::{GenerationError, GenerationRequest, TrainingConfig};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub const EXAMPLES: [&str; 8] = [
    "to be or not to",
    "the king of",
    "once upon a time",
    "i have a dream that",
    "the meaning of life is",
    "in the beginning",
    "all the world is a",
    "what is the meaning of",
];

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/examples", get(examples))
        .route("/api/status", get(status))
        .route("/api/health", get(health))
        .route("/api/training/start", post(training_start))
        .route("/api/training/status", get(training_status))
        .route("/api/training/stop", post(training_stop))
        .with_state(state)
}

/// Parse a JSON body; an empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request("InvalidInput", format!("invalid JSON body: {e}")))
}

async fn generate(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let snapshot = state.registry.get().ok_or(GenerationError::ModelNotLoaded)?;
    let request: GenerationRequest = parse_body(&body)?;

    let generator = Arc::clone(&state.generator);
    let req = request.clone();
    let generation = tokio::task::spawn_blocking(move || generator.generate(Some(snapshot.as_ref()), &req))
        .await
        .map_err(|e| ApiError::internal("GenerationFailure", e.to_string()))??;

    Ok(Json(json!({
        "success": true,
        "seed_text": request.seed_text,
        "generated_text": generation.text,
        "num_words": request.num_words,
        "words_generated": generation.words_generated,
        "temperature": request.temperature,
        "generation_time": format!("{:.3}s", generation.elapsed.as_secs_f64()),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn examples() -> impl IntoResponse {
    Json(json!({ "examples": EXAMPLES }))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.registry.status();
    Json(json!({
        "success": true,
        "model_loaded": status.model_loaded,
        "tokenizer_loaded": status.model_loaded,
        "vocab_size": status.vocab_size,
        "sequence_length": status.sequence_length,
        "model_type": status.model_type,
        "embedding_type": status.embedding_type,
        "embedding_dim": status.embedding_dim,
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "model_ready": state.registry.is_loaded(),
    }))
}

async fn training_start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let config: TrainingConfig = parse_body(&body)?;
    let accepted = tokio::task::spawn_blocking(move || state.job.start(config))
        .await
        .map_err(|e| ApiError::internal("SupervisorGone", e.to_string()))??;

    Ok(Json(json!({
        "success": true,
        "message": "Training started",
        "config": accepted,
    })))
}

async fn training_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let mut body = serde_json::to_value(state.job.status())
        .map_err(|e| ApiError::internal("Serialization", e.to_string()))?;
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
    }
    Ok(Json(body))
}

async fn training_stop(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    tokio::task::spawn_blocking(move || state.job.request_stop())
        .await
        .map_err(|e| ApiError::internal("SupervisorGone", e.to_string()))??;
    Ok(Json(json!({
        "success": true,
        "message": "Training will stop after current epoch",
    })))
}
