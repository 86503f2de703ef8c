//! Gain envelope bookkeeping
//!
//! Mirrors what the engine has scheduled on the graph's gain parameter: the
//! stored target and at most one linear ramp. Every new fade cancels pending
//! automation, pins the instantaneous value, then ramps from there, so
//! consecutive fades never jump.

use crate::host::AudioGraph;
use serde::Serialize;
use std::time::Duration;

/// A linear gain transition on the context clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GainRamp {
    pub from: f32,
    pub to: f32,
    /// Context time the ramp starts (seconds)
    pub start: f64,
    /// Context time the ramp reaches `to` (seconds)
    pub end: f64,
}

impl GainRamp {
    pub fn value_at(&self, t: f64) -> f32 {
        if t <= self.start {
            return self.from;
        }
        if t >= self.end || self.end <= self.start {
            return self.to;
        }
        let progress = ((t - self.start) / (self.end - self.start)) as f32;
        self.from + (self.to - self.from) * progress
    }

    pub fn is_active_at(&self, t: f64) -> bool {
        t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GainEnvelope {
    /// Value the envelope is heading to (or holding)
    target: f32,
    /// Most recently scheduled ramp
    ramp: Option<GainRamp>,
}

impl GainEnvelope {
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Most recently scheduled ramp, finished or not
    pub fn last_ramp(&self) -> Option<GainRamp> {
        self.ramp
    }

    /// The ramp still in flight at context time `now`
    pub fn active_ramp(&self, now: f64) -> Option<GainRamp> {
        self.ramp.filter(|ramp| ramp.is_active_at(now))
    }

    /// Supersede any pending automation with a ramp to `target`
    pub fn fade_to(&mut self, graph: &dyn AudioGraph, target: f32, duration: Duration) -> GainRamp {
        let now = graph.current_time();
        let current = graph.gain_value();

        graph.cancel_scheduled_gain(now);
        graph.set_gain_at(current, now);
        let end = now + duration.as_secs_f64();
        graph.ramp_gain_to(target, end);

        let ramp = GainRamp {
            from: current,
            to: target,
            start: now,
            end,
        };
        self.target = target;
        self.ramp = Some(ramp);
        ramp
    }

    /// Drop all automation and hold silence
    pub fn silence(&mut self, graph: &dyn AudioGraph) {
        let now = graph.current_time();
        graph.cancel_scheduled_gain(now);
        graph.set_gain_at(0.0, now);
        self.target = 0.0;
        self.ramp = None;
    }
}
