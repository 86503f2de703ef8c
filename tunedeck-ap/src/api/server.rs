//! HTTP server setup and routing

use crate::coordinator::PlaybackCoordinator;
use crate::error::{Error, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tunedeck_common::events::EventBus;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub coordinator: Arc<PlaybackCoordinator>,
    pub events: EventBus,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        // Volume
        .route(
            "/audio/volume",
            get(super::handlers::get_volume).post(super::handlers::set_volume),
        )
        .route("/audio/spectrum", get(super::handlers::get_spectrum))
        // Playback control
        .route("/playback/state", get(super::handlers::get_playback_state))
        .route("/playback/toggle", post(super::handlers::toggle))
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/next", post(super::handlers::skip_next))
        .route("/playback/previous", post(super::handlers::skip_previous))
        .route("/playback/seek", post(super::handlers::seek))
        .route("/playback/shuffle", post(super::handlers::toggle_shuffle))
        .route("/playback/repeat", post(super::handlers::set_repeat))
        .route(
            "/playback/queue",
            get(super::handlers::get_queue).post(super::handlers::set_queue),
        )
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
