//! HTTP request handlers

use crate::api::server::AppContext;
use crate::coordinator::{PlaybackSnapshot, QueueSnapshot};
use crate::error::Error;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tunedeck_common::{RepeatMode, TrackId};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: status.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// 0-100, clamped
    volume: f64,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u8,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    track_id: TrackId,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// Seconds from the start
    position: f64,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    moved: bool,
}

#[derive(Debug, Serialize)]
pub struct ShuffleResponse {
    shuffle: bool,
}

#[derive(Debug, Deserialize)]
pub struct RepeatRequest {
    mode: String,
}

#[derive(Debug, Serialize)]
pub struct RepeatResponse {
    repeat: RepeatMode,
}

#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    tracks: Vec<TrackId>,
}

#[derive(Debug, Serialize)]
pub struct SpectrumResponse {
    bins: Vec<u8>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::UnsupportedPlatform(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (status, StatusResponse::new(e.to_string()))
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "audio_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Audio Endpoints
// ============================================================================

/// GET /audio/volume - Get stored UI volume
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: ctx.coordinator.player_state().volume,
    })
}

/// POST /audio/volume - Set UI volume (0-100)
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    let volume = ctx.coordinator.set_volume(req.volume).await;
    info!("Volume set to {}", volume);
    Json(VolumeResponse { volume })
}

/// GET /audio/spectrum - Latest analyzer frame (empty until playback starts)
pub async fn get_spectrum(State(ctx): State<AppContext>) -> Json<SpectrumResponse> {
    Json(SpectrumResponse {
        bins: ctx.coordinator.latest_spectrum(),
    })
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlaybackSnapshot> {
    Json(ctx.coordinator.snapshot())
}

/// POST /playback/toggle - Play or pause the loaded track
pub async fn toggle(
    State(ctx): State<AppContext>,
) -> Result<Json<PlaybackSnapshot>, ApiError> {
    ctx.coordinator.toggle_play().await.map_err(error_response)?;
    Ok(Json(ctx.coordinator.snapshot()))
}

/// POST /playback/play - Load and play a catalog track
pub async fn play(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<PlaybackSnapshot>, ApiError> {
    ctx.coordinator
        .play_track_id(&req.track_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ctx.coordinator.snapshot()))
}

/// POST /playback/next
pub async fn skip_next(
    State(ctx): State<AppContext>,
) -> Result<Json<NavigationResponse>, ApiError> {
    let moved = ctx.coordinator.next().await.map_err(error_response)?;
    Ok(Json(NavigationResponse { moved }))
}

/// POST /playback/previous
pub async fn skip_previous(
    State(ctx): State<AppContext>,
) -> Result<Json<NavigationResponse>, ApiError> {
    let moved = ctx.coordinator.previous().await.map_err(error_response)?;
    Ok(Json(NavigationResponse { moved }))
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> StatusCode {
    ctx.coordinator.seek(req.position).await;
    StatusCode::NO_CONTENT
}

/// POST /playback/shuffle - Flip shuffle
pub async fn toggle_shuffle(State(ctx): State<AppContext>) -> Json<ShuffleResponse> {
    Json(ShuffleResponse {
        shuffle: ctx.coordinator.toggle_shuffle().await,
    })
}

/// POST /playback/repeat - `off`, `one` or `all`
pub async fn set_repeat(
    State(ctx): State<AppContext>,
    Json(req): Json<RepeatRequest>,
) -> Result<Json<RepeatResponse>, ApiError> {
    if !ctx.coordinator.set_repeat(&req.mode).await {
        return Err(error_response(Error::BadRequest(format!(
            "Unknown repeat mode '{}'",
            req.mode
        ))));
    }
    Ok(Json(RepeatResponse {
        repeat: ctx.coordinator.player_state().repeat,
    }))
}

/// GET /playback/queue
pub async fn get_queue(State(ctx): State<AppContext>) -> Json<QueueSnapshot> {
    Json(ctx.coordinator.queue())
}

/// POST /playback/queue - Replace the queue
pub async fn set_queue(
    State(ctx): State<AppContext>,
    Json(req): Json<QueueRequest>,
) -> Json<QueueSnapshot> {
    ctx.coordinator.set_queue(req.tracks).await;
    Json(ctx.coordinator.queue())
}
