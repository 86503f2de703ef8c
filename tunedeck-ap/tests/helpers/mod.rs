//! Test doubles for host capabilities
//!
//! `FakeHost` hands out one scriptable `FakeMedia` and wraps the real
//! `SoftwareGraph`, so gain automation is observable without an output sink.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tunedeck_ap::config::EngineConfig;
use tunedeck_ap::engine::AudioEngine;
use tunedeck_ap::error::{Error, PlaybackRejected, Result};
use tunedeck_ap::host::{AudioGraph, AudioHost, MediaElement, MediaEvent, SoftwareGraph};

pub const SAMPLE_RATE: u32 = 48000;

#[derive(Debug)]
struct FakeMediaState {
    source: Option<String>,
    current_time: f64,
    duration: f64,
    buffered: f64,
    paused: bool,
    reject_play: bool,
    play_calls: usize,
}

/// Media element whose timeline is set by the test
pub struct FakeMedia {
    state: Mutex<FakeMediaState>,
    events: broadcast::Sender<MediaEvent>,
}

impl FakeMedia {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(FakeMediaState {
                source: None,
                current_time: 0.0,
                duration: f64::NAN,
                buffered: 0.0,
                paused: true,
                reject_play: false,
                play_calls: 0,
            }),
            events,
        }
    }

    /// Report metadata for the bound source
    pub fn load_metadata(&self, duration: f64) {
        {
            let mut state = self.state.lock().unwrap();
            state.duration = duration;
            state.buffered = duration;
        }
        let _ = self.events.send(MediaEvent::LoadedMetadata);
    }

    /// Jump to the end and report it
    pub fn finish(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.duration.is_nan() {
                state.current_time = state.duration;
            }
            state.paused = true;
        }
        let _ = self.events.send(MediaEvent::Ended);
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.state.lock().unwrap().reject_play = reject;
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }
}

#[async_trait]
impl MediaElement for FakeMedia {
    fn set_source(&self, url: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.source = url.map(str::to_string);
        state.current_time = 0.0;
        state.duration = f64::NAN;
        state.buffered = 0.0;
        state.paused = true;
    }

    fn source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.current_time = if state.duration.is_nan() {
            seconds
        } else {
            seconds.min(state.duration)
        };
    }

    fn duration(&self) -> f64 {
        self.state.lock().unwrap().duration
    }

    fn buffered_end(&self) -> f64 {
        self.state.lock().unwrap().buffered
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    async fn play(&self) -> std::result::Result<(), PlaybackRejected> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if state.reject_play {
            return Err(PlaybackRejected::new("not allowed without user gesture"));
        }
        if state.source.is_none() {
            return Err(PlaybackRejected::new("no source"));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().unwrap().paused = true;
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

/// Host handing out a `FakeMedia` and a `SoftwareGraph`
pub struct FakeHost {
    unsupported: bool,
    media: Mutex<Option<Arc<FakeMedia>>>,
    graph: Mutex<Option<Arc<SoftwareGraph>>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            unsupported: false,
            media: Mutex::new(None),
            graph: Mutex::new(None),
        })
    }

    /// Host that cannot build a processing graph
    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            unsupported: true,
            media: Mutex::new(None),
            graph: Mutex::new(None),
        })
    }

    pub fn media(&self) -> Arc<FakeMedia> {
        self.media.lock().unwrap().clone().expect("no media created")
    }

    pub fn graph(&self) -> Option<Arc<SoftwareGraph>> {
        self.graph.lock().unwrap().clone()
    }
}

impl AudioHost for FakeHost {
    fn create_media(&self) -> Arc<dyn MediaElement> {
        let media = Arc::new(FakeMedia::new());
        *self.media.lock().unwrap() = Some(Arc::clone(&media));
        media
    }

    fn create_graph(
        &self,
        _media: Arc<dyn MediaElement>,
        fft_size: usize,
    ) -> Result<Arc<dyn AudioGraph>> {
        if self.unsupported {
            return Err(Error::UnsupportedPlatform(
                "no audio processing available".to_string(),
            ));
        }
        let graph = Arc::new(SoftwareGraph::new(SAMPLE_RATE, fft_size));
        *self.graph.lock().unwrap() = Some(Arc::clone(&graph));
        Ok(graph)
    }
}

/// Engine on a fresh fake host with default timings
pub fn fake_engine() -> (AudioEngine, Arc<FakeHost>) {
    let host = FakeHost::new();
    let engine = AudioEngine::new(host.clone(), EngineConfig::default());
    (engine, host)
}

/// Write a mono 16-bit sine WAV
pub fn write_sine_wav(path: &Path, sample_rate: u32, seconds: f32, frequency: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (sample_rate as f32 * seconds) as usize;
    for n in 0..total {
        let t = n as f32 / sample_rate as f32;
        let sample = (t * frequency * std::f32::consts::TAU).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}
