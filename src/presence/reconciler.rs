// src/presence/reconciler.rs
//
// Drives one frame of ledger mutation and emits the frame's transitions.
//
// Order within a frame:
//   1. observe every gated detection (ENTER for ids the ledger did not hold)
//   2. tick absentees once (EXIT for ids whose absence exceeded the threshold)
//
// Only tracks absent this frame can be evicted, so a track seen in the frame
// where it would otherwise have expired is never reported as EXIT.

use super::ledger::{Observation, PresenceLedger};
use crate::types::{GatedDetection, TransitionEvent, TransitionKind};
use std::collections::HashSet;
use tracing::{debug, info};

pub struct Reconciler {
    ledger: PresenceLedger,
    exit_threshold: u32,
    frame_sequence: u64,
}

impl Reconciler {
    pub fn new(exit_threshold: u32) -> Self {
        Self {
            ledger: PresenceLedger::new(),
            exit_threshold,
            frame_sequence: 0,
        }
    }

    /// Reconcile the next frame. Frame sequence numbers start at 1.
    pub fn reconcile(&mut self, detections: &[GatedDetection]) -> Vec<TransitionEvent> {
        self.frame_sequence += 1;
        let frame = self.frame_sequence;

        let mut current_ids = HashSet::with_capacity(detections.len());
        let mut events = Vec::new();

        for det in detections {
            if !current_ids.insert(det.track_id) {
                debug!("{} repeated in frame {}, ignoring", det.track_id, frame);
                continue;
            }

            let observation = self.ledger.observe(det.track_id, det.center, frame);
            if let Some(label) = &det.label {
                self.ledger.record_label(det.track_id, label);
            }

            if observation == Observation::Entered {
                info!(
                    "🟢 {} entered the lot at frame {} ({:.0}, {:.0})",
                    det.track_id, frame, det.center.x, det.center.y
                );
                events.push(TransitionEvent {
                    track_id: det.track_id,
                    kind: TransitionKind::Enter,
                    frame_sequence_number: frame,
                    center: det.center,
                    label: det.label.clone(),
                });
            }
        }

        for entry in self
            .ledger
            .tick_absentees(frame, &current_ids, self.exit_threshold)
        {
            info!(
                "🔴 {} left the lot at frame {} (absent {} frames)",
                entry.track_id, frame, entry.absence_count
            );
            events.push(TransitionEvent {
                track_id: entry.track_id,
                kind: TransitionKind::Exit,
                frame_sequence_number: frame,
                center: entry.last_known_center,
                label: entry.label,
            });
        }

        events
    }

    pub fn frame_sequence(&self) -> u64 {
        self.frame_sequence
    }

    pub fn ledger(&self) -> &PresenceLedger {
        &self.ledger
    }

    /// Start a new tracking session: empty ledger, frame numbering from 1.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.frame_sequence = 0;
    }
}
