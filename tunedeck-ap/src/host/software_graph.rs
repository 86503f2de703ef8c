//! In-process processing graph
//!
//! `SoftwareGraph` implements [`AudioGraph`] for rendered PCM: the output
//! callback hands each block to [`SoftwareGraph::process`], which applies the
//! gain automation sample by sample and feeds a mono mix to the analyzer.
//!
//! # Clock
//!
//! The context clock is `frames_rendered / sample_rate`. It only advances while
//! the context is running, so scheduled ramps never run ahead of the audio.
//!
//! # Gain automation
//!
//! A small automation timeline with two event kinds:
//! - **SetValue**: hold a value from a time on
//! - **LinearRamp**: move linearly from the previous event's value (and time)
//!   to a target, arriving at the event's end time

use super::analyzer::SpectrumAnalyzer;
use super::{AudioGraph, ContextState};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum AutomationEvent {
    SetValue { value: f32, time: f64 },
    LinearRamp { value: f32, end_time: f64 },
}

impl AutomationEvent {
    fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. } => time,
            AutomationEvent::LinearRamp { end_time, .. } => end_time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            AutomationEvent::SetValue { value, .. } | AutomationEvent::LinearRamp { value, .. } => {
                value
            }
        }
    }
}

/// Gain automation timeline
#[derive(Debug, Clone)]
struct GainTimeline {
    /// Value in effect before the first event
    base_value: f32,
    /// Time the base value was reached
    base_time: f64,
    /// Events ordered by time
    events: Vec<AutomationEvent>,
}

impl GainTimeline {
    fn new(initial: f32) -> Self {
        Self {
            base_value: initial,
            base_time: 0.0,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        // Later events with the same time go after existing ones
        let pos = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    fn cancel_from(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    fn value_at(&self, t: f64) -> f32 {
        let mut value = self.base_value;
        let mut prev_time = self.base_time;

        for event in &self.events {
            match *event {
                AutomationEvent::SetValue { value: v, time } => {
                    if time > t {
                        break;
                    }
                    value = v;
                    prev_time = time;
                }
                AutomationEvent::LinearRamp { value: v, end_time } => {
                    if end_time <= t {
                        value = v;
                        prev_time = end_time;
                        continue;
                    }
                    let span = end_time - prev_time;
                    if span <= 0.0 || t < prev_time {
                        break;
                    }
                    let progress = ((t - prev_time) / span) as f32;
                    value += (v - value) * progress;
                    break;
                }
            }
        }

        value
    }

    /// Fold events that finished before `now` into the base value
    fn prune(&mut self, now: f64) {
        while let Some(first) = self.events.first() {
            if first.time() > now {
                break;
            }
            self.base_value = first.value();
            self.base_time = first.time();
            self.events.remove(0);
        }
    }
}

struct GraphState {
    context: ContextState,
    connected: bool,
    frames_rendered: u64,
    timeline: GainTimeline,
    analyzer: SpectrumAnalyzer,
    /// Reused mono mix for the analyzer
    mono: Vec<f32>,
}

/// Software gain + analyzer stage driven by an output callback
pub struct SoftwareGraph {
    sample_rate: u32,
    state: Mutex<GraphState>,
}

impl SoftwareGraph {
    /// New suspended context at `sample_rate` with an `fft_size` analyzer
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            state: Mutex::new(GraphState {
                context: ContextState::Suspended,
                connected: true,
                frames_rendered: 0,
                timeline: GainTimeline::new(1.0),
                analyzer: SpectrumAnalyzer::new(fft_size),
                mono: Vec::new(),
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of gain events still pending on the timeline
    pub fn scheduled_gain_events(&self) -> usize {
        self.state.lock().map(|s| s.timeline.events.len()).unwrap_or(0)
    }

    /// Apply gain to an interleaved block and feed the analyzer.
    ///
    /// Outputs silence (without advancing the clock) unless the context is
    /// running and connected.
    pub fn process(&self, block: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => {
                block.fill(0.0);
                return;
            }
        };
        let state = &mut *guard;

        if state.context != ContextState::Running || !state.connected {
            block.fill(0.0);
            return;
        }

        let rate = self.sample_rate as f64;
        let start_frame = state.frames_rendered;
        state.mono.clear();

        for (i, frame) in block.chunks_mut(channels).enumerate() {
            let t = (start_frame + i as u64) as f64 / rate;
            let gain = state.timeline.value_at(t);
            let mut sum = 0.0;
            for sample in frame.iter_mut() {
                *sample *= gain;
                sum += *sample;
            }
            state.mono.push(sum / channels as f32);
        }

        state.frames_rendered += state.mono.len() as u64;
        state.analyzer.push_samples(&state.mono);

        let now = state.frames_rendered as f64 / rate;
        state.timeline.prune(now);
    }
}

#[async_trait]
impl AudioGraph for SoftwareGraph {
    fn state(&self) -> ContextState {
        self.state
            .lock()
            .map(|s| s.context)
            .unwrap_or(ContextState::Closed)
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::AudioOutput("graph state poisoned".to_string()))?;
        match state.context {
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                state.context = ContextState::Running;
                debug!("Processing context resumed");
                Ok(())
            }
            ContextState::Closed => Err(Error::AudioOutput(
                "cannot resume a closed context".to_string(),
            )),
        }
    }

    fn current_time(&self) -> f64 {
        self.state
            .lock()
            .map(|s| s.frames_rendered as f64 / self.sample_rate as f64)
            .unwrap_or(0.0)
    }

    fn gain_value(&self) -> f32 {
        self.state
            .lock()
            .map(|s| {
                let now = s.frames_rendered as f64 / self.sample_rate as f64;
                s.timeline.value_at(now)
            })
            .unwrap_or(0.0)
    }

    fn cancel_scheduled_gain(&self, time: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.timeline.cancel_from(time);
        }
    }

    fn set_gain_at(&self, value: f32, time: f64) {
        if let Ok(mut state) = self.state.lock() {
            state
                .timeline
                .insert(AutomationEvent::SetValue { value, time });
        }
    }

    fn ramp_gain_to(&self, value: f32, end_time: f64) {
        if let Ok(mut state) = self.state.lock() {
            state
                .timeline
                .insert(AutomationEvent::LinearRamp { value, end_time });
        }
    }

    fn frequency_bin_count(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.analyzer.frequency_bin_count())
            .unwrap_or(0)
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        if let Ok(mut state) = self.state.lock() {
            state.analyzer.byte_frequency_data(out);
        }
    }

    fn disconnect(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.connected = false;
            state.analyzer.reset();
        }
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.context = ContextState::Closed;
        }
    }
}
