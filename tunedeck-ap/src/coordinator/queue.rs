//! Play queue
//!
//! Ordered track ids with a current pointer. Sequential navigation stops at
//! the ends unless repeat is `All`. Shuffle draws a random not-yet-played
//! index; `previous` walks back through the shuffle history.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use tunedeck_common::{RepeatMode, TrackId};

/// Serializable view of the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub tracks: Vec<TrackId>,
    pub index: Option<usize>,
}

pub struct QueueState {
    tracks: Vec<TrackId>,
    index: Option<usize>,
    /// Indices left behind by shuffled `next` calls
    history: Vec<usize>,
    /// Indices played in the current shuffle pass
    played: HashSet<usize>,
    rng: StdRng,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic shuffle order
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            index: None,
            history: Vec::new(),
            played: HashSet::new(),
            rng,
        }
    }

    /// Replace the contents. The pointer follows `current` when it is present
    /// in the new list.
    pub fn set_tracks(&mut self, tracks: Vec<TrackId>, current: Option<&TrackId>) {
        self.index = current.and_then(|id| tracks.iter().position(|t| t == id));
        self.tracks = tracks;
        self.reset_shuffle();
    }

    /// Point at `id` if queued
    pub fn select(&mut self, id: &TrackId) -> Option<usize> {
        let position = self.tracks.iter().position(|t| t == id)?;
        if self.index != Some(position) {
            if let Some(current) = self.index {
                self.history.push(current);
            }
            self.index = Some(position);
        }
        self.played.insert(position);
        Some(position)
    }

    /// Drop the pointer (the current track is not queued)
    pub fn clear_position(&mut self) {
        self.index = None;
        self.reset_shuffle();
    }

    /// Forget shuffle history
    pub fn reset_shuffle(&mut self) {
        self.history.clear();
        self.played.clear();
        if let Some(index) = self.index {
            self.played.insert(index);
        }
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&TrackId> {
        self.index.and_then(|i| self.tracks.get(i))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.tracks.clone(),
            index: self.index,
        }
    }

    /// Advance; returns the new current id, or None when nothing moved.
    ///
    /// An unpositioned queue starts at its first entry.
    pub fn next(&mut self, repeat: RepeatMode, shuffle: bool) -> Option<TrackId> {
        if self.tracks.is_empty() {
            return None;
        }
        let Some(current) = self.index else {
            return self.move_to(0, false);
        };

        if shuffle && self.tracks.len() > 1 {
            let target = self.shuffle_pick(current, repeat)?;
            return self.move_to(target, true);
        }

        if current + 1 < self.tracks.len() {
            self.move_to(current + 1, false)
        } else if repeat == RepeatMode::All {
            self.move_to(0, false)
        } else {
            None
        }
    }

    /// Step back; returns the new current id, or None when nothing moved
    pub fn previous(&mut self, repeat: RepeatMode, shuffle: bool) -> Option<TrackId> {
        let current = self.index?;

        if shuffle {
            let target = self.history.pop()?;
            self.index = Some(target);
            return self.tracks.get(target).cloned();
        }

        if current > 0 {
            self.move_to(current - 1, false)
        } else if repeat == RepeatMode::All && !self.tracks.is_empty() {
            self.move_to(self.tracks.len() - 1, false)
        } else {
            None
        }
    }

    fn move_to(&mut self, target: usize, remember: bool) -> Option<TrackId> {
        if remember {
            if let Some(current) = self.index {
                self.history.push(current);
            }
        }
        self.index = Some(target);
        self.played.insert(target);
        self.tracks.get(target).cloned()
    }

    fn shuffle_pick(&mut self, current: usize, repeat: RepeatMode) -> Option<usize> {
        self.played.insert(current);
        let mut candidates: Vec<usize> = (0..self.tracks.len())
            .filter(|i| *i != current && !self.played.contains(i))
            .collect();

        if candidates.is_empty() {
            if repeat != RepeatMode::All {
                return None;
            }
            // New pass
            self.played.clear();
            self.played.insert(current);
            candidates = (0..self.tracks.len()).filter(|i| *i != current).collect();
        }

        let pick = self.rng.gen_range(0..candidates.len());
        Some(candidates[pick])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(ids: &[&str], current: Option<&str>) -> QueueState {
        let mut q = QueueState::with_seed(7);
        let current = current.map(TrackId::from);
        q.set_tracks(ids.iter().map(|s| TrackId::from(*s)).collect(), current.as_ref());
        q
    }

    #[test]
    fn test_next_wraps_only_with_repeat_all() {
        let mut q = queue(&["a", "b", "c"], Some("c"));
        assert_eq!(q.next(RepeatMode::Off, false), None);
        assert_eq!(q.index(), Some(2));
        assert_eq!(q.next(RepeatMode::One, false), None);

        assert_eq!(q.next(RepeatMode::All, false), Some(TrackId::from("a")));
        assert_eq!(q.index(), Some(0));
    }

    #[test]
    fn test_cleared_position_restarts_from_first_entry() {
        let mut q = queue(&["a", "b", "c"], Some("b"));
        assert_eq!(q.select(&TrackId::from("x")), None);
        assert_eq!(q.index(), Some(1));

        q.clear_position();
        assert_eq!(q.index(), None);
        assert_eq!(q.current(), None);
        assert_eq!(q.next(RepeatMode::Off, false), Some(TrackId::from("a")));
    }

    #[test]
    fn test_previous_wraps_only_with_repeat_all() {
        let mut q = queue(&["a", "b", "c"], Some("a"));
        assert_eq!(q.previous(RepeatMode::Off, false), None);
        assert_eq!(q.previous(RepeatMode::All, false), Some(TrackId::from("c")));
        assert_eq!(q.previous(RepeatMode::Off, false), Some(TrackId::from("b")));
    }

    #[test]
    fn test_unpositioned_queue_starts_at_first() {
        let mut q = queue(&["a", "b"], Some("zz"));
        assert_eq!(q.index(), None);
        assert_eq!(q.previous(RepeatMode::All, false), None);
        assert_eq!(q.next(RepeatMode::Off, false), Some(TrackId::from("a")));
    }

    #[test]
    fn test_empty_queue_never_moves() {
        let mut q = queue(&[], None);
        assert_eq!(q.next(RepeatMode::All, true), None);
        assert_eq!(q.previous(RepeatMode::All, true), None);
    }

    #[test]
    fn test_shuffle_visits_every_track_once_per_pass() {
        let mut q = queue(&["a", "b", "c", "d"], Some("a"));
        let mut seen = vec![0usize];
        while q.next(RepeatMode::Off, true).is_some() {
            let index = q.index().unwrap();
            assert!(!seen.contains(&index));
            seen.push(index);
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_shuffle_repeat_all_starts_new_pass() {
        let mut q = queue(&["a", "b"], Some("a"));
        assert_eq!(q.next(RepeatMode::All, true), Some(TrackId::from("b")));
        assert_eq!(q.next(RepeatMode::All, true), Some(TrackId::from("a")));
    }

    #[test]
    fn test_shuffle_previous_walks_history() {
        let mut q = queue(&["a", "b", "c", "d"], Some("b"));
        let first = q.next(RepeatMode::Off, true).unwrap();
        let second = q.next(RepeatMode::Off, true).unwrap();
        assert_ne!(first, second);

        assert_eq!(q.previous(RepeatMode::Off, true), Some(first));
        assert_eq!(q.previous(RepeatMode::Off, true), Some(TrackId::from("b")));
        assert_eq!(q.previous(RepeatMode::Off, true), None);
    }

    #[test]
    fn test_set_tracks_keeps_current_when_present() {
        let mut q = queue(&["a", "b"], Some("b"));
        let current = q.current().cloned();
        q.set_tracks(vec![TrackId::from("x"), TrackId::from("b")], current.as_ref());
        assert_eq!(q.index(), Some(1));
    }

    #[test]
    fn test_select_points_at_queued_track() {
        let mut q = queue(&["a", "b", "c"], None);
        assert_eq!(q.select(&TrackId::from("c")), Some(2));
        assert_eq!(q.select(&TrackId::from("missing")), None);
        assert_eq!(q.index(), Some(2));
    }
}
