//! Frame-driven polling loops
//!
//! Each loop is a tokio task ticking at a fixed short period (one display
//! frame by default). Ticks that fall behind are skipped rather than bunched.
//! `stop` is synchronous: once it returns no new tick starts, although a tick
//! already running on another worker may still finish.

use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct FrameLoop {
    name: &'static str,
    token: Option<CancellationToken>,
}

impl FrameLoop {
    pub fn new(name: &'static str) -> Self {
        Self { name, token: None }
    }

    pub fn is_running(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Start ticking every `period` unless already running.
    ///
    /// `tick` returns false to end the loop on its own. The first tick fires
    /// one period after start. Must be called within a Tokio runtime.
    pub fn start<F>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if self.is_running() {
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let name = self.name;

        tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!("{} loop started ({:?} period)", name, period);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if cancelled.is_cancelled() || !tick() {
                            break;
                        }
                    }
                }
            }
            cancelled.cancel();
            debug!("{} loop stopped", name);
        });

        self.token = Some(token);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
