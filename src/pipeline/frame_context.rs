// src/pipeline/frame_context.rs
//
// Everything the side-effect dispatcher needs about one frame. Built only
// after the ledger has been fully updated for that frame, so dispatch never
// observes a half-reconciled state.

use crate::types::{GatedDetection, TransitionEvent, TransitionKind};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct FrameResult {
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
    /// Every accepted detection of the frame, label attached only if trusted
    pub detections: Vec<GatedDetection>,
    pub transitions: Vec<TransitionEvent>,
    /// Malformed tracker records skipped at ingestion
    pub rejected: usize,
    /// Records dropped by the tracking threshold or class filter
    pub filtered: usize,
}

impl FrameResult {
    pub fn entered(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.transitions
            .iter()
            .filter(|t| t.kind == TransitionKind::Enter)
    }

    pub fn exited(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.transitions
            .iter()
            .filter(|t| t.kind == TransitionKind::Exit)
    }

    pub fn labelled_detections(&self) -> impl Iterator<Item = &GatedDetection> {
        self.detections.iter().filter(|d| d.label.is_some())
    }
}
