// src/pipeline/orchestrator.rs
//
// Per-frame entry point for one tracking session:
//
//   RawDetection[] → IngestFilter → ClassificationGate → Reconciler → FrameResult
//
// Pure in-memory work; the returned FrameResult is handed to the
// dispatcher only after this call returns.

use super::frame_context::FrameResult;
use super::metrics::PipelineMetrics;
use crate::ingest::IngestFilter;
use crate::presence::{ClassificationGate, PresenceLedger, Reconciler};
use crate::types::{Config, GatedDetection, RawDetection};
use chrono::{DateTime, Utc};
use tracing::info;

pub struct PresencePipeline {
    ingest: IngestFilter,
    gate: ClassificationGate,
    reconciler: Reconciler,
    metrics: PipelineMetrics,
}

impl PresencePipeline {
    pub fn new(config: &Config, metrics: PipelineMetrics) -> Self {
        info!(
            "Presence pipeline: tracking>={:.2}, classification>={:.2}, exit after {} absent frames",
            config.tracking.tracking_confidence_threshold,
            config.classification.classification_confidence_threshold,
            config.tracking.exit_frame_threshold
        );
        Self {
            ingest: IngestFilter::from_config(&config.tracking),
            gate: ClassificationGate::from_config(&config.classification),
            reconciler: Reconciler::new(config.tracking.exit_frame_threshold),
            metrics,
        }
    }

    pub fn process_frame(&mut self, raw: &[RawDetection], timestamp: DateTime<Utc>) -> FrameResult {
        self.process_frame_with_undecodable(raw, 0, timestamp)
    }

    /// `process_frame` for input where `undecodable` records were already
    /// dropped before they could be parsed. They count as rejected.
    pub fn process_frame_with_undecodable(
        &mut self,
        raw: &[RawDetection],
        undecodable: usize,
        timestamp: DateTime<Utc>,
    ) -> FrameResult {
        let batch = self.ingest.ingest(raw);

        let detections: Vec<GatedDetection> =
            batch.detections.iter().map(|d| self.gate.gate(d)).collect();

        let transitions = self.reconciler.reconcile(&detections);

        let result = FrameResult {
            frame_id: self.reconciler.frame_sequence(),
            timestamp,
            detections,
            transitions,
            rejected: batch.rejected + undecodable,
            filtered: batch.filtered,
        };
        self.record_metrics(&result);
        result
    }

    fn record_metrics(&self, result: &FrameResult) {
        let m = &self.metrics;
        m.inc(&m.total_frames);
        m.add(&m.detections_accepted, result.detections.len() as u64);
        m.add(&m.detections_rejected, result.rejected as u64);
        m.add(&m.detections_filtered, result.filtered as u64);
        m.add(&m.labels_accepted, result.labelled_detections().count() as u64);
        m.add(&m.enters, result.entered().count() as u64);
        m.add(&m.exits, result.exited().count() as u64);
    }

    /// End the current tracking session and start a fresh one.
    pub fn reset(&mut self) {
        self.reconciler.reset();
    }

    /// `reset`, then count the new session into `metrics`.
    pub fn begin_session(&mut self, metrics: PipelineMetrics) {
        self.reset();
        self.metrics = metrics;
    }

    pub fn ledger(&self) -> &PresenceLedger {
        self.reconciler.ledger()
    }

    pub fn present_count(&self) -> usize {
        self.reconciler.ledger().len()
    }
}
