//! Audio Player (tunedeck-ap) - Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunedeck_ap::api::{self, AppContext};
use tunedeck_ap::config::Config;
use tunedeck_ap::coordinator::{EngineSlot, PlaybackCoordinator, StaticCatalog};
use tunedeck_ap::engine::AudioEngine;
use tunedeck_ap::host::local::LocalHost;
use tunedeck_common::config::TomlConfig;
use tunedeck_common::events::EventBus;
use tunedeck_common::settings::{MemorySettings, SettingsStore, SqliteSettings};
use tunedeck_common::track::TrackLibrary;

/// Command-line arguments for tunedeck-ap
#[derive(Parser, Debug)]
#[command(name = "tunedeck-ap")]
#[command(about = "Audio Player for Tunedeck")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TUNEDECK_PORT")]
    port: Option<u16>,

    /// Configuration file
    #[arg(short, long, env = "TUNEDECK_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite file for persisted player settings
    #[arg(long, env = "TUNEDECK_SETTINGS_DB")]
    settings_db: Option<PathBuf>,

    /// Track library file
    #[arg(short, long, env = "TUNEDECK_LIBRARY")]
    library: Option<PathBuf>,
}

const EVENT_BUS_CAPACITY: usize = 256;

/// Process-wide engine
static ENGINE: EngineSlot = EngineSlot::new();

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunedeck_ap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let toml_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let mut config = Config::from(&toml_config);
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.settings_db.is_some() {
        config.settings_db = args.settings_db;
    }
    if args.library.is_some() {
        config.library = args.library;
    }

    info!("Starting Tunedeck Audio Player on port {}", config.port);

    let settings: Arc<dyn SettingsStore> = match &config.settings_db {
        Some(path) => Arc::new(
            SqliteSettings::open(path)
                .await
                .with_context(|| format!("Failed to open settings database {}", path.display()))?,
        ),
        None => {
            warn!("No settings database configured, player settings will not persist");
            Arc::new(MemorySettings::new())
        }
    };

    let library = match &config.library {
        Some(path) => TrackLibrary::load(path)
            .with_context(|| format!("Failed to load track library {}", path.display()))?,
        None => {
            warn!("No track library configured, queue starts empty");
            TrackLibrary::default()
        }
    };

    let host = Arc::new(LocalHost::detect());
    let engine_config = config.engine.clone();
    let engine = ENGINE.get_or_init(move || AudioEngine::new(host, engine_config));
    engine
        .initialize()
        .context("Failed to initialize audio engine")?;

    let events = EventBus::new(EVENT_BUS_CAPACITY);
    let coordinator = PlaybackCoordinator::new(
        engine.clone(),
        settings,
        Arc::new(StaticCatalog::new(library)),
        events.clone(),
        config.progress_interval,
    )
    .await;

    let ctx = AppContext {
        coordinator: Arc::clone(&coordinator),
        events,
    };
    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    coordinator.shutdown();
    engine.dispose();
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
