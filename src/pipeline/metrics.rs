// src/pipeline/metrics.rs
//
// Counters for the frame loop and the dispatcher. Cloned into the
// background dispatch worker, hence the shared atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub detections_accepted: Arc<AtomicU64>,
    pub detections_rejected: Arc<AtomicU64>,
    pub detections_filtered: Arc<AtomicU64>,
    pub labels_accepted: Arc<AtomicU64>,
    pub enters: Arc<AtomicU64>,
    pub exits: Arc<AtomicU64>,
    pub persistence_successes: Arc<AtomicU64>,
    pub persistence_failures: Arc<AtomicU64>,
    pub notification_successes: Arc<AtomicU64>,
    pub notification_failures: Arc<AtomicU64>,
    pub dispatch_timeouts: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            detections_accepted: Arc::new(AtomicU64::new(0)),
            detections_rejected: Arc::new(AtomicU64::new(0)),
            detections_filtered: Arc::new(AtomicU64::new(0)),
            labels_accepted: Arc::new(AtomicU64::new(0)),
            enters: Arc::new(AtomicU64::new(0)),
            exits: Arc::new(AtomicU64::new(0)),
            persistence_successes: Arc::new(AtomicU64::new(0)),
            persistence_failures: Arc::new(AtomicU64::new(0)),
            notification_successes: Arc::new(AtomicU64::new(0)),
            notification_failures: Arc::new(AtomicU64::new(0)),
            dispatch_timeouts: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            detections_accepted: self.detections_accepted.load(Ordering::Relaxed),
            detections_rejected: self.detections_rejected.load(Ordering::Relaxed),
            detections_filtered: self.detections_filtered.load(Ordering::Relaxed),
            labels_accepted: self.labels_accepted.load(Ordering::Relaxed),
            enters: self.enters.load(Ordering::Relaxed),
            exits: self.exits.load(Ordering::Relaxed),
            persistence_successes: self.persistence_successes.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            notification_successes: self.notification_successes.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            dispatch_timeouts: self.dispatch_timeouts.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub detections_accepted: u64,
    pub detections_rejected: u64,
    pub detections_filtered: u64,
    pub labels_accepted: u64,
    pub enters: u64,
    pub exits: u64,
    pub persistence_successes: u64,
    pub persistence_failures: u64,
    pub notification_successes: u64,
    pub notification_failures: u64,
    pub dispatch_timeouts: u64,
    pub elapsed_secs: f64,
}
