use super::state::AppState;
use crate::audio::AudioFile;
use crate::error::AsrError;
use crate::recognition::{
    GenerateOptions, MemoryInfo, MergedTurn, RecognitionCache, ResourceGuard, ResultMerger,
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{error, info, warn};

const DEFAULT_BATCH_SIZE_S: u32 = 300;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub success: bool,

    /// Speaker turns in order
    pub data: Vec<MergedTurn>,

    pub total_segments: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub websocket_model_loaded: bool,
    pub file_model_loaded: bool,
    pub websocket_users: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub websocket_port: u16,
    pub api_port: u16,
    pub connected_users: usize,

    /// Accelerator memory in GB, absent without an accelerator
    pub gpu_memory: Option<GpuMemory>,

    pub models: ModelStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GpuMemory {
    pub total: f64,
    pub allocated: f64,
    pub cached: f64,
    pub free: f64,
}

impl From<MemoryInfo> for GpuMemory {
    fn from(info: MemoryInfo) -> Self {
        Self {
            total: info.total_bytes as f64 / GB,
            allocated: info.allocated_bytes as f64 / GB,
            cached: info.cached_bytes as f64 / GB,
            free: info.free_bytes() as f64 / GB,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelStatus {
    pub asr: String,
    pub asr_streaming: String,
    pub vad: bool,
    pub punc: bool,
    pub speaker: bool,
    pub file: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Fields of a `/api/recognize` form
struct RecognizeForm {
    audio: Option<tempfile::NamedTempFile>,
    filename: Option<String>,
    batch_size_s: u32,
    hotword: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/recognize
/// One-shot recognition of an uploaded WAV file
pub async fn recognize_file(State(state): State<AppState>, multipart: Multipart) -> impl IntoResponse {
    let Some(file_model) = state.collaborators.file.clone() else {
        error!("File recognition requested but no file model is configured");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "File recognition model is not loaded");
    };

    // The temp file lives until this handler returns, on every path
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            let status = form_error_status(&e);
            if status.is_server_error() {
                error!("Failed to store upload: {}", e);
            } else {
                warn!("Rejected upload: {}", e);
            }
            return error_response(status, e.to_string());
        }
    };

    let Some(audio) = form.audio.as_ref() else {
        return error_response(StatusCode::BAD_REQUEST, "No file selected");
    };

    let filename = form.filename.clone().unwrap_or_default();
    info!("Recognizing uploaded file: {}", filename);

    let pcm = match AudioFile::open(audio.path()).and_then(|file| file.to_pcm_16khz_mono()) {
        Ok(pcm) => pcm,
        Err(e) => {
            warn!("Could not decode {}: {}", filename, e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let resources = &state.config.resources;
    let guard = ResourceGuard::new(
        state.collaborators.accelerator.clone(),
        resources.safety_factor,
        resources.relaxed_factor,
    );
    if !guard.admit(pcm.len() as u64).await {
        let e = AsrError::ResourceExhausted { bytes: pcm.len() };
        return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
    }

    let options = GenerateOptions {
        is_final: true,
        hotword: form.hotword.clone(),
        batch_size_s: Some(form.batch_size_s),
        ..Default::default()
    };

    let result = {
        let _permit = state.collaborators.inference_permit().await;
        file_model.generate(&pcm, &mut RecognitionCache::new(), &options).await
    };
    guard.relieve().await;

    let recognition = match result {
        Ok(recognition) => recognition,
        Err(e) => {
            error!("Recognition of {} failed: {}", filename, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Recognition failed: {}", e));
        }
    };

    let merge = &state.config.merge;
    let turns = ResultMerger::new(merge.continuity_threshold_ms, merge.speaker_label_prefix.clone())
        .merge(&recognition.sentence_info);

    info!("Recognition of {} complete: {} segments", filename, turns.len());

    (
        StatusCode::OK,
        Json(RecognizeResponse {
            success: true,
            total_segments: turns.len(),
            data: turns,
        }),
    )
        .into_response()
}

/// Storing the upload is our fault; anything else about the form is the client's
fn form_error_status(error: &AsrError) -> StatusCode {
    match error {
        AsrError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn read_form(mut multipart: Multipart) -> Result<RecognizeForm, AsrError> {
    let mut form = RecognizeForm {
        audio: None,
        filename: None,
        batch_size_s: DEFAULT_BATCH_SIZE_S,
        hotword: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AsrError::InvalidUpload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AsrError::InvalidUpload(e.to_string()))?;

                // An empty filename means the form had no file selected
                if filename.as_deref().unwrap_or_default().is_empty() || bytes.is_empty() {
                    continue;
                }

                let mut file = tempfile::Builder::new().suffix(".wav").tempfile()?;
                file.write_all(&bytes)?;
                file.flush()?;

                form.audio = Some(file);
                form.filename = filename;
            }
            "batch_size_s" => {
                let text = field.text().await.map_err(|e| AsrError::InvalidUpload(e.to_string()))?;
                form.batch_size_s = text
                    .trim()
                    .parse()
                    .map_err(|_| AsrError::InvalidUpload(format!("Invalid batch_size_s: {}", text)))?;
            }
            "hotword" => {
                let text = field.text().await.map_err(|e| AsrError::InvalidUpload(e.to_string()))?;
                if !text.is_empty() {
                    form.hotword = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// GET /api/health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            // Streaming recognizers are injected at startup and always present
            websocket_model_loaded: true,
            file_model_loaded: state.collaborators.file.is_some(),
            websocket_users: state.connected_users().await,
        }),
    )
}

/// GET /api/status
/// Ports, connections, accelerator memory and configured models
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let gpu_memory = match state.collaborators.accelerator.snapshot().await {
        Ok(memory) => memory.map(GpuMemory::from),
        Err(e) => {
            warn!("Accelerator memory probe failed: {}", e);
            None
        }
    };

    let collaborators = &state.collaborators;
    (
        StatusCode::OK,
        Json(StatusResponse {
            websocket_port: state.config.service.websocket.port,
            api_port: state.config.service.http.port,
            connected_users: state.connected_users().await,
            gpu_memory,
            models: ModelStatus {
                asr: collaborators.offline.name().to_string(),
                asr_streaming: collaborators.online.name().to_string(),
                vad: true,
                punc: collaborators.punctuation.is_some(),
                speaker: collaborators.speaker.is_some(),
                file: collaborators.file.is_some(),
            },
        }),
    )
}
