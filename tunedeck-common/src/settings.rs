//! Settings persistence
//!
//! Read/write player settings through a key-value store with string values.
//! The player hydrates its volume, last played track, shuffle flag and repeat
//! mode from here at startup and writes back only the fields that changed.

use crate::track::{RepeatMode, TrackId};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Setting keys
pub mod keys {
    pub const VOLUME: &str = "player_volume";
    pub const LAST_TRACK_ID: &str = "player_last_track_id";
    pub const SHUFFLE: &str = "player_shuffle";
    pub const REPEAT: &str = "player_repeat";
}

/// Default UI volume (0-100)
pub const DEFAULT_VOLUME: u8 = 50;

/// Key-value store with string values
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local settings (lost on exit)
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, mainly for tests
    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(map),
        }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| crate::Error::Internal("settings lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| crate::Error::Internal("settings lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(feature = "sqlx")]
pub use sqlite::SqliteSettings;

#[cfg(feature = "sqlx")]
mod sqlite {
    use super::SettingsStore;
    use crate::Result;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use std::path::Path;
    use tracing::info;

    /// Settings table in a SQLite database
    #[derive(Clone)]
    pub struct SqliteSettings {
        pool: SqlitePool,
    }

    impl SqliteSettings {
        /// Open (creating if needed) the database file and the settings table
        pub async fn open(db_path: &Path) -> Result<Self> {
            let newly_created = !db_path.exists();

            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
            let pool = SqlitePoolOptions::new()
                .max_connections(4)
                .connect(&db_url)
                .await?;

            if newly_created {
                info!("Initialized new settings database: {}", db_path.display());
            } else {
                info!("Opened existing settings database: {}", db_path.display());
            }

            Self::from_pool(pool).await
        }

        /// In-memory database (single connection so all queries share it)
        pub async fn open_in_memory() -> Result<Self> {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;
            Self::from_pool(pool).await
        }

        /// Wrap an existing pool, creating the settings table if needed
        pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(&pool)
            .await?;

            Ok(Self { pool })
        }
    }

    #[async_trait]
    impl SettingsStore for SqliteSettings {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let value: Option<Option<String>> =
                sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(value.flatten())
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value)
                VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                               updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }
}

/// Persisted subset of player state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    /// UI volume 0-100
    pub volume: u8,
    /// Last played track (kept even when nothing is playing)
    pub last_track_id: Option<TrackId>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            last_track_id: None,
            shuffle: false,
            repeat: RepeatMode::Off,
        }
    }
}

impl PlayerSettings {
    /// Read settings, falling back to defaults per field on missing or
    /// invalid values. Store errors are logged, never returned.
    pub async fn hydrate(store: &dyn SettingsStore) -> Self {
        let mut settings = Self::default();

        if let Some(raw) = read(store, keys::VOLUME).await {
            match raw.trim().parse::<f64>() {
                Ok(v) if !v.is_nan() => settings.volume = v.clamp(0.0, 100.0).round() as u8,
                _ => warn!("Ignoring invalid stored volume '{}'", raw),
            }
        }

        if let Some(raw) = read(store, keys::LAST_TRACK_ID).await {
            // Empty string means "no last track"
            settings.last_track_id = (!raw.is_empty()).then(|| TrackId::new(raw));
        }

        if let Some(raw) = read(store, keys::SHUFFLE).await {
            settings.shuffle = raw == "true";
        }

        if let Some(raw) = read(store, keys::REPEAT).await {
            match raw.parse::<RepeatMode>() {
                Ok(mode) => settings.repeat = mode,
                Err(_) => warn!("Ignoring invalid stored repeat mode '{}'", raw),
            }
        }

        debug!("Hydrated player settings: {:?}", settings);
        settings
    }

    /// Write back the fields that differ from `previous`
    pub async fn persist_changes(&self, previous: &PlayerSettings, store: &dyn SettingsStore) {
        if self.volume != previous.volume {
            write(store, keys::VOLUME, &self.volume.to_string()).await;
        }
        if self.last_track_id != previous.last_track_id {
            let value = self
                .last_track_id
                .as_ref()
                .map(|id| id.as_str())
                .unwrap_or("");
            write(store, keys::LAST_TRACK_ID, value).await;
        }
        if self.shuffle != previous.shuffle {
            write(store, keys::SHUFFLE, if self.shuffle { "true" } else { "false" }).await;
        }
        if self.repeat != previous.repeat {
            write(store, keys::REPEAT, self.repeat.as_str()).await;
        }
    }
}

async fn read(store: &dyn SettingsStore, key: &str) -> Option<String> {
    match store.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read setting '{}': {}", key, e);
            None
        }
    }
}

async fn write(store: &dyn SettingsStore, key: &str, value: &str) {
    if let Err(e) = store.set(key, value).await {
        warn!("Failed to persist setting '{}': {}", key, e);
    }
}
