//! HTTP routes.
//!
//! The turn endpoints mimic Ollama's `/api/generate` and `/api/chat` so that
//! Ollama clients can talk to a messaging peer as if it were a local model.
//! A conversation is continued by passing the returned `conversation_id` back
//! in `options.conversation_id`.

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatbridge_conversation::ChatMessage;
use chatbridge_relay::{Connection, Dispatcher, TurnTelemetry};
use chatbridge_transcript::{TranscriptEntry, TranscriptError, TranscriptName, TranscriptStore};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher<dyn Connection>>,
    model_name: Arc<str>,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(dispatcher: Arc<Dispatcher<dyn Connection>>, model_name: impl Into<Arc<str>>) -> Self {
        Self {
            dispatcher,
            model_name: model_name.into(),
            started_at: Utc::now(),
        }
    }

    fn store(&self) -> &TranscriptStore {
        self.dispatcher.registry().store()
    }
}

/// Builds the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tags", get(list_models))
        .route("/api/generate", post(generate))
        .route("/api/chat", post(chat))
        .route("/api/history", get(list_history))
        .route("/api/history/{date}/{chat_number}", get(get_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-request options. Unknown Ollama options are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: Option<RequestOptions>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: Option<RequestOptions>,
}

fn conversation_id(options: Option<&RequestOptions>) -> Option<&str> {
    options.and_then(|o| o.conversation_id.as_deref())
}

/// Ollama timing fields, in nanoseconds.
#[derive(Debug, Serialize)]
pub struct Timings {
    pub total_duration: u64,
    pub load_duration: u64,
    pub prompt_eval_count: usize,
    pub prompt_eval_duration: u64,
    pub eval_count: usize,
    pub eval_duration: u64,
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl From<&TurnTelemetry> for Timings {
    fn from(telemetry: &TurnTelemetry) -> Self {
        Self {
            total_duration: nanos(telemetry.total),
            load_duration: 0,
            prompt_eval_count: telemetry.prompt_chars,
            prompt_eval_duration: nanos(telemetry.residual),
            eval_count: telemetry.reply_chars,
            eval_duration: nanos(telemetry.wait),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub response: String,
    pub done: bool,
    pub conversation_id: String,
    pub log_file: String,
    #[serde(flatten)]
    pub timings: Timings,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub message: ChatMessage,
    pub done: bool,
    pub conversation_id: String,
    pub log_file: String,
    #[serde(flatten)]
    pub timings: Timings,
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if request.stream {
        return Err(ApiError::StreamingUnsupported);
    }

    let result = state
        .dispatcher
        .generate(
            &request.prompt,
            request.system.as_deref(),
            conversation_id(request.options.as_ref()),
        )
        .await?;

    Ok(Json(GenerateResponse {
        model: state.model_name.to_string(),
        created_at: Utc::now(),
        timings: Timings::from(&result.telemetry),
        conversation_id: result.conversation_id.to_string(),
        log_file: result.log_path.display().to_string(),
        response: result.reply,
        done: true,
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.stream {
        return Err(ApiError::StreamingUnsupported);
    }

    let result = state
        .dispatcher
        .chat(&request.messages, conversation_id(request.options.as_ref()))
        .await?;

    Ok(Json(ChatResponse {
        model: state.model_name.to_string(),
        created_at: Utc::now(),
        timings: Timings::from(&result.telemetry),
        conversation_id: result.conversation_id.to_string(),
        log_file: result.log_path.display().to_string(),
        message: ChatMessage::assistant(result.reply),
        done: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct ModelDetails {
    pub family: String,
    pub parameter_size: String,
    pub quantization_level: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub model: String,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
    pub digest: String,
    pub details: ModelDetails,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    let name = state.model_name.to_string();
    Json(ModelList {
        models: vec![ModelInfo {
            model: name.clone(),
            digest: name.clone(),
            name,
            modified_at: state.started_at,
            size: 0,
            details: ModelDetails {
                family: "chatbridge".to_string(),
                parameter_size: "Unknown".to_string(),
                quantization_level: "None".to_string(),
            },
        }],
    })
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub date: String,
    pub chat_number: u32,
    pub filename: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryList {
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Serialize)]
pub struct HistoryRecord {
    pub filename: String,
    pub content: String,
    pub messages: Vec<TranscriptEntry>,
}

async fn list_history(State(state): State<AppState>) -> Result<Json<HistoryList>, ApiError> {
    let history = state
        .store()
        .list()
        .await?
        .into_iter()
        .map(|summary| HistoryItem {
            date: summary.name.date_string(),
            chat_number: summary.name.sequence(),
            filename: summary.file_name,
            path: summary.path.display().to_string(),
        })
        .collect();

    Ok(Json(HistoryList { history }))
}

async fn get_history(
    State(state): State<AppState>,
    Path((date, chat_number)): Path<(String, String)>,
) -> Result<Json<HistoryRecord>, ApiError> {
    let name =
        TranscriptName::parse(&date, &chat_number).map_err(Report::<TranscriptError>::from)?;
    let record = state.store().fetch(name).await?;

    Ok(Json(HistoryRecord {
        filename: record.file_name,
        content: record.content,
        messages: record.messages,
    }))
}
