//! Process-wide engine instance

use crate::engine::AudioEngine;
use std::sync::OnceLock;

/// Holds the single [`AudioEngine`] of the process.
///
/// Owned by the composition root and passed to whoever needs the engine; the
/// first `get_or_init` builds it and every later call returns the same one.
#[derive(Default)]
pub struct EngineSlot {
    cell: OnceLock<AudioEngine>,
}

impl EngineSlot {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> AudioEngine) -> AudioEngine {
        self.cell.get_or_init(init).clone()
    }

    pub fn get(&self) -> Option<AudioEngine> {
        self.cell.get().cloned()
    }
}
