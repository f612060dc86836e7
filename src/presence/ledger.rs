// src/presence/ledger.rs
//
// Single source of truth for "what is on the lot". One entry per present
// track; an entry is created on first observation and destroyed once its
// absence counter exceeds the exit threshold. Nothing outside this type
// mutates an entry.

use crate::types::{Point, TrackId};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Present,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub track_id: TrackId,
    pub state: PresenceState,
    /// Consecutive frames the track has been missing. 0 whenever observed.
    pub absence_count: u32,
    pub last_known_center: Point,
    pub entered_frame: u64,
    pub last_seen_frame: u64,
    /// Most recent accepted classification label
    pub label: Option<String>,
}

/// What `observe` did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting: a new entry was created
    Entered,
    /// Existing entry refreshed and absence reset
    Refreshed,
}

#[derive(Debug, Default)]
pub struct PresenceLedger {
    entries: BTreeMap<TrackId, PresenceEntry>,
    last_ticked_frame: Option<u64>,
}

impl PresenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, track_id: TrackId, center: Point, frame: u64) -> Observation {
        match self.entries.get_mut(&track_id) {
            Some(entry) => {
                entry.absence_count = 0;
                entry.last_known_center = center;
                entry.last_seen_frame = frame;
                Observation::Refreshed
            }
            None => {
                self.entries.insert(
                    track_id,
                    PresenceEntry {
                        track_id,
                        state: PresenceState::Present,
                        absence_count: 0,
                        last_known_center: center,
                        entered_frame: frame,
                        last_seen_frame: frame,
                        label: None,
                    },
                );
                Observation::Entered
            }
        }
    }

    /// Attach an accepted label to a present track. Returns false if the track is unknown.
    pub fn record_label(&mut self, track_id: TrackId, label: &str) -> bool {
        match self.entries.get_mut(&track_id) {
            Some(entry) => {
                entry.label = Some(label.to_string());
                true
            }
            None => false,
        }
    }

    /// Age every entry not in `observed` by one frame and evict those whose
    /// absence now exceeds `exit_threshold`. Evicted entries come back
    /// ordered by track id.
    ///
    /// Must run exactly once per frame, after all `observe` calls for that
    /// frame. A second call for the same (or an older) frame is a bug in the
    /// caller and panics.
    pub fn tick_absentees(
        &mut self,
        frame: u64,
        observed: &HashSet<TrackId>,
        exit_threshold: u32,
    ) -> Vec<PresenceEntry> {
        if let Some(last) = self.last_ticked_frame {
            assert!(
                frame > last,
                "tick_absentees called for frame {} after frame {} was already ticked",
                frame,
                last
            );
        }
        self.last_ticked_frame = Some(frame);

        let mut expired = Vec::new();
        for (track_id, entry) in self.entries.iter_mut() {
            if observed.contains(track_id) {
                continue;
            }
            entry.absence_count = entry.absence_count.saturating_add(1);
            if entry.absence_count > exit_threshold {
                expired.push(*track_id);
            }
        }

        expired
            .into_iter()
            .filter_map(|track_id| self.entries.remove(&track_id))
            .collect()
    }

    /// Forget everything. Starts a new tracking session.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.last_ticked_frame = None;
    }

    #[cfg(test)]
    pub fn contains(&self, track_id: TrackId) -> bool {
        self.entries.contains_key(&track_id)
    }

    #[cfg(test)]
    pub fn get(&self, track_id: TrackId) -> Option<&PresenceEntry> {
        self.entries.get(&track_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracks currently on the lot, ordered by id.
    pub fn present_ids(&self) -> Vec<TrackId> {
        self.entries
            .values()
            .filter(|e| e.state == PresenceState::Present)
            .map(|e| e.track_id)
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PresenceEntry> {
        self.entries.values()
    }
}
