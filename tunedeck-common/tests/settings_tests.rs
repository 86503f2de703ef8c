//! Integration tests for the SQLite settings store

use tunedeck_common::settings::{keys, PlayerSettings, SettingsStore, SqliteSettings};
use tunedeck_common::{RepeatMode, TrackId};

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let store = SqliteSettings::open_in_memory().await.unwrap();
    assert_eq!(store.get("nothing_here").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_overwrites_existing_value() {
    let store = SqliteSettings::open_in_memory().await.unwrap();

    store.set(keys::VOLUME, "30").await.unwrap();
    store.set(keys::VOLUME, "75").await.unwrap();

    assert_eq!(store.get(keys::VOLUME).await.unwrap().as_deref(), Some("75"));
}

#[tokio::test]
async fn test_open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("settings.db");

    let store = SqliteSettings::open(&db_path).await.unwrap();
    store.set(keys::SHUFFLE, "true").await.unwrap();

    assert!(db_path.exists());
}

#[tokio::test]
async fn test_player_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("settings.db");

    {
        let store = SqliteSettings::open(&db_path).await.unwrap();
        let before = PlayerSettings::default();
        let after = PlayerSettings {
            volume: 80,
            last_track_id: Some(TrackId::from("t2")),
            shuffle: true,
            repeat: RepeatMode::One,
        };
        after.persist_changes(&before, &store).await;
    }

    let store = SqliteSettings::open(&db_path).await.unwrap();
    let hydrated = PlayerSettings::hydrate(&store).await;
    assert_eq!(hydrated.volume, 80);
    assert_eq!(hydrated.last_track_id, Some(TrackId::from("t2")));
    assert!(hydrated.shuffle);
    assert_eq!(hydrated.repeat, RepeatMode::One);
}
