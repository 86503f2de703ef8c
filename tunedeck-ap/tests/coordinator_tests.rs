//! Coordinator behavior: volume mapping, queue navigation, stream end

mod helpers;

use helpers::{fake_engine, FakeHost};
use std::sync::Arc;
use std::time::Duration;
use tunedeck_ap::coordinator::{PlaybackCoordinator, StaticCatalog};
use tunedeck_ap::engine::AudioEngine;
use tunedeck_ap::host::MediaElement;
use tunedeck_common::events::{EventBus, PlayerEvent};
use tunedeck_common::settings::{keys, MemorySettings};
use tunedeck_common::track::TrackLibrary;
use tunedeck_common::{RepeatMode, Track, TrackId};

struct Fixture {
    coordinator: Arc<PlaybackCoordinator>,
    engine: AudioEngine,
    host: Arc<FakeHost>,
    settings: Arc<MemorySettings>,
}

fn library() -> TrackLibrary {
    let mut ghost = Track::new("ghost", "");
    ghost.url = None;
    TrackLibrary::new([
        Track::new("a", "/music/a.flac"),
        Track::new("b", "/music/b.flac"),
        Track::new("c", "/music/c.flac"),
        ghost,
    ])
}

async fn fixture_with(settings: MemorySettings, events: EventBus) -> Fixture {
    let (engine, host) = fake_engine();
    let settings = Arc::new(settings);
    let coordinator = PlaybackCoordinator::new(
        engine.clone(),
        settings.clone(),
        Arc::new(StaticCatalog::new(library())),
        events,
        Duration::from_secs(1),
    )
    .await;
    Fixture {
        coordinator,
        engine,
        host,
        settings,
    }
}

async fn fixture() -> Fixture {
    fixture_with(MemorySettings::new(), EventBus::new(256)).await
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn id(s: &str) -> TrackId {
    TrackId::from(s)
}

#[tokio::test(start_paused = true)]
async fn test_hydrated_volume_is_applied_to_engine() {
    let f = fixture_with(
        MemorySettings::with_values([(keys::VOLUME, "20")]),
        EventBus::new(16),
    )
    .await;
    assert_eq!(f.coordinator.player_state().volume, 20);
    assert!((f.engine.volume() - 0.2).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_volume_maps_to_linear_gain() {
    let f = fixture().await;

    assert_eq!(f.coordinator.set_volume(50.0).await, 50);
    assert_eq!(f.engine.volume(), 0.5);
    assert_eq!(f.coordinator.set_volume(0.0).await, 0);
    assert_eq!(f.engine.volume(), 0.0);
    assert_eq!(f.coordinator.set_volume(100.0).await, 100);
    assert_eq!(f.engine.volume(), 1.0);

    assert_eq!(f.coordinator.set_volume(250.0).await, 100);
    assert_eq!(f.coordinator.set_volume(f64::NAN).await, 100);
    assert_eq!(
        f.settings.snapshot().get(keys::VOLUME).map(String::as_str),
        Some("100")
    );
}

#[tokio::test(start_paused = true)]
async fn test_toggle_without_source_does_nothing() {
    let f = fixture().await;
    f.coordinator.toggle_play().await.unwrap();
    assert!(!f.coordinator.is_playing());
    assert!(!f.coordinator.player_state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_play_track_loads_then_plays() {
    let f = fixture().await;
    f.coordinator
        .play_track(&Track::new("x", "/music/x.flac"))
        .await
        .unwrap();

    assert_eq!(f.engine.source().as_deref(), Some("/music/x.flac"));
    assert!(f.coordinator.is_playing());
    let state = f.coordinator.player_state();
    assert!(state.is_playing);
    assert_eq!(state.current_track_id, Some(id("x")));
    assert_eq!(
        f.settings
            .snapshot()
            .get(keys::LAST_TRACK_ID)
            .map(String::as_str),
        Some("x")
    );
}

#[tokio::test(start_paused = true)]
async fn test_play_track_without_url_is_ignored() {
    let f = fixture().await;
    let mut track = Track::new("x", "  ");
    f.coordinator.play_track(&track).await.unwrap();
    track.url = None;
    f.coordinator.play_track(&track).await.unwrap();

    assert!(!f.engine.has_source());
    assert_eq!(f.coordinator.player_state().current_track_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_play_unknown_id_is_not_found() {
    let f = fixture().await;
    let err = f.coordinator.play_track_id(&id("nope")).await.unwrap_err();
    assert!(matches!(err, tunedeck_ap::Error::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_pauses_and_resumes() {
    let f = fixture().await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();

    f.coordinator.toggle_play().await.unwrap();
    assert!(!f.coordinator.player_state().is_playing);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!f.coordinator.is_playing());

    f.coordinator.toggle_play().await.unwrap();
    assert!(f.coordinator.player_state().is_playing);
    assert!(f.coordinator.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_restart_resumes_queue_from_last_track() {
    let f = fixture_with(
        MemorySettings::with_values([(keys::LAST_TRACK_ID, "b")]),
        EventBus::new(16),
    )
    .await;
    assert_eq!(f.coordinator.player_state().current_track_id, None);
    assert_eq!(f.coordinator.queue().index, Some(1));

    assert!(f.coordinator.next().await.unwrap());
    assert_eq!(f.engine.source().as_deref(), Some("/music/c.flac"));
    assert!(!f.coordinator.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_play_track_outside_queue_clears_position() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b")]).await;
    f.coordinator.play_track_id(&id("b")).await.unwrap();
    assert_eq!(f.coordinator.queue().index, Some(1));

    f.coordinator
        .play_track(&Track::new("x", "/music/x.flac"))
        .await
        .unwrap();
    assert_eq!(f.coordinator.queue().index, None);

    assert!(f.coordinator.next().await.unwrap());
    assert_eq!(f.coordinator.player_state().current_track_id, Some(id("a")));
    assert_eq!(f.engine.source().as_deref(), Some("/music/a.flac"));
}

#[tokio::test(start_paused = true)]
async fn test_next_wraps_with_repeat_all() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b"), id("c")]).await;
    assert!(f.coordinator.set_repeat("all").await);
    f.coordinator.play_track_id(&id("c")).await.unwrap();

    assert!(f.coordinator.next().await.unwrap());
    assert_eq!(f.coordinator.player_state().current_track_id, Some(id("a")));
    assert_eq!(f.engine.source().as_deref(), Some("/music/a.flac"));
    assert!(f.coordinator.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_next_at_end_without_repeat_is_no_op() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b"), id("c")]).await;
    f.coordinator.play_track_id(&id("c")).await.unwrap();

    assert!(!f.coordinator.next().await.unwrap());
    assert_eq!(f.coordinator.player_state().current_track_id, Some(id("c")));
    assert_eq!(f.engine.source().as_deref(), Some("/music/c.flac"));
    assert!(f.coordinator.is_playing());
    assert_eq!(f.coordinator.queue().index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_previous_at_start_wraps_only_with_repeat_all() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b"), id("c")]).await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();

    assert!(!f.coordinator.previous().await.unwrap());
    f.coordinator.set_repeat("all").await;
    assert!(f.coordinator.previous().await.unwrap());
    assert_eq!(f.coordinator.player_state().current_track_id, Some(id("c")));
}

#[tokio::test(start_paused = true)]
async fn test_next_while_paused_loads_without_playing() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b")]).await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();
    f.coordinator.toggle_play().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(f.coordinator.next().await.unwrap());
    assert_eq!(f.engine.source().as_deref(), Some("/music/b.flac"));
    assert!(!f.coordinator.is_playing());
    assert!(!f.coordinator.player_state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_unplayable_track_updates_intent_only() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("ghost")]).await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();

    assert!(f.coordinator.next().await.unwrap());
    assert_eq!(
        f.coordinator.player_state().current_track_id,
        Some(id("ghost"))
    );
    assert_eq!(f.engine.source().as_deref(), Some("/music/a.flac"));
}

#[tokio::test(start_paused = true)]
async fn test_repeat_one_replays_on_stream_end() {
    let f = fixture().await;
    f.coordinator.set_repeat("one").await;
    f.coordinator.play_track_id(&id("b")).await.unwrap();
    let media = f.host.media();
    media.load_metadata(90.0);
    settle().await;

    media.finish();
    settle().await;
    settle().await;

    assert_eq!(media.play_calls(), 2);
    assert_eq!(media.current_time(), 0.0);
    assert_eq!(f.engine.source().as_deref(), Some("/music/b.flac"));
    assert!(f.coordinator.is_playing());
    assert_eq!(f.coordinator.player_state().current_track_id, Some(id("b")));
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_advances_and_autoplays() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b")]).await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();

    f.host.media().finish();
    settle().await;
    settle().await;

    assert_eq!(f.engine.source().as_deref(), Some("/music/b.flac"));
    assert!(f.coordinator.is_playing());
    assert_eq!(f.coordinator.player_state().current_track_id, Some(id("b")));
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_of_last_track_stops() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b")]).await;
    f.coordinator.play_track_id(&id("b")).await.unwrap();

    f.host.media().finish();
    settle().await;
    settle().await;

    assert_eq!(f.engine.source().as_deref(), Some("/music/b.flac"));
    assert!(!f.coordinator.is_playing());
    assert!(!f.coordinator.player_state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_and_shuffle_are_persisted() {
    let f = fixture().await;
    assert!(f.coordinator.set_repeat("all").await);
    assert!(!f.coordinator.set_repeat("ALL").await);
    assert!(f.coordinator.toggle_shuffle().await);

    let state = f.coordinator.player_state();
    assert_eq!(state.repeat, RepeatMode::All);
    assert!(state.shuffle);

    let saved = f.settings.snapshot();
    assert_eq!(saved.get(keys::REPEAT).map(String::as_str), Some("all"));
    assert_eq!(saved.get(keys::SHUFFLE).map(String::as_str), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_are_throttled() {
    let events = EventBus::new(1024);
    let mut rx = events.subscribe();
    let f = fixture_with(MemorySettings::new(), events).await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(3100)).await;

    let mut progress = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PlayerEvent::PlaybackProgress { .. }) {
            progress += 1;
        }
    }
    // Initial snapshot plus one per second
    assert!((3..=5).contains(&progress), "got {} progress events", progress);
}

#[tokio::test(start_paused = true)]
async fn test_spectrum_frames_are_kept() {
    let f = fixture().await;
    assert!(f.coordinator.latest_spectrum().is_empty());

    f.coordinator.play_track_id(&id("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.coordinator.latest_spectrum().len(), 512);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_detaches_from_engine() {
    let f = fixture().await;
    f.coordinator.set_queue(vec![id("a"), id("b")]).await;
    f.coordinator.play_track_id(&id("a")).await.unwrap();
    f.coordinator.shutdown();

    f.host.media().finish();
    settle().await;
    assert_eq!(f.engine.source().as_deref(), Some("/music/a.flac"));
}
