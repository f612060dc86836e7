// src/dispatch/worker.rs
//
// Background dispatch: the frame loop hands finished FrameResults to a
// bounded queue and moves on; a single task drains the queue in FIFO order,
// so per-frame side effects keep their submission order. A full queue makes
// `submit` wait (backpressure) instead of dropping frames.

use super::dispatcher::{DispatchSummary, SideEffectDispatcher};
use crate::pipeline::FrameResult;
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct DispatchWorker {
    sender: mpsc::Sender<FrameResult>,
    handle: JoinHandle<DispatchSummary>,
}

impl DispatchWorker {
    pub fn spawn(dispatcher: SideEffectDispatcher, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<FrameResult>(capacity.max(1));

        let handle = tokio::spawn(async move {
            let mut summary = DispatchSummary::default();
            while let Some(frame) = receiver.recv().await {
                let outcome = dispatcher.dispatch(&frame).await;
                debug!(
                    "Frame {} dispatched: {} ok, {} failed",
                    outcome.frame_id,
                    outcome.calls.iter().filter(|c| c.is_ok()).count(),
                    outcome.calls.iter().filter(|c| !c.is_ok()).count()
                );
                for line in outcome.failure_lines() {
                    debug!("Frame {}: {}", outcome.frame_id, line);
                }
                summary.absorb(&outcome);
            }
            summary
        });

        info!("📤 Background dispatch worker started (queue capacity {})", capacity.max(1));
        Self { sender, handle }
    }

    /// Queue a frame. Waits while the queue is full.
    pub async fn submit(&self, frame: FrameResult) -> Result<()> {
        self.sender
            .send(frame)
            .await
            .map_err(|e| anyhow::anyhow!("dispatch worker stopped, frame {} lost", e.0.frame_id))
    }

    /// Close the queue, let the worker drain it, and return its totals.
    pub async fn shutdown(self) -> Result<DispatchSummary> {
        drop(self.sender);
        let summary = self.handle.await.context("Dispatch worker panicked")?;
        info!(
            "📤 Dispatch worker drained: {} frames, {} calls ok, {} failed, {} retried",
            summary.frames, summary.calls_ok, summary.calls_failed, summary.calls_retried
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatcher::DispatchPolicy;
    use crate::dispatch::testing::{RecordingNotifier, RecordingStore, SlowNotifier};
    use crate::dispatch::notifier::NotificationKind;
    use crate::pipeline::{PipelineMetrics, PresencePipeline};
    use crate::types::{Config, NotificationMode, RawDetection};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy(timeout: Duration) -> DispatchPolicy {
        DispatchPolicy {
            mode: NotificationMode::Transition,
            timeout,
            max_attempts: 1,
            retry_backoff: Duration::from_millis(1),
            track_label_prefix: "moto".to_string(),
        }
    }

    fn moto(id: u64) -> RawDetection {
        RawDetection {
            track_id: Some(id),
            bbox: vec![10.0, 10.0, 50.0, 90.0],
            confidence: Some(0.9),
            class_id: Some(3),
            classification: None,
        }
    }

    #[tokio::test]
    async fn test_worker_preserves_frame_order() {
        let store = Arc::new(RecordingStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher =
            SideEffectDispatcher::new(store.clone(), notifier.clone(), policy(Duration::from_secs(1)));
        let worker = DispatchWorker::spawn(dispatcher, 2);

        let mut config = Config::default();
        config.tracking.exit_frame_threshold = 2;
        let mut pipeline = PresencePipeline::new(&config, PipelineMetrics::new());
        for f in 0..50u64 {
            let raws = if f % 10 < 5 { vec![moto(1), moto(2)] } else { vec![] };
            worker
                .submit(pipeline.process_frame(&raws, Utc::now()))
                .await
                .unwrap();
        }

        let summary = worker.shutdown().await.unwrap();
        assert_eq!(summary.frames, 50);
        assert_eq!(summary.calls_failed, 0);

        let frames: Vec<u64> = store.records().iter().map(|r| r.frame_id).collect();
        assert_eq!(frames.len(), 50);
        assert!(frames.windows(2).all(|w| w[0] <= w[1]));

        let kinds: Vec<_> = notifier
            .sent()
            .iter()
            .filter(|n| n.track_id == "moto_1")
            .map(|n| n.kind)
            .collect();
        assert_eq!(kinds.len(), 10);
        assert!(kinds.chunks(2).all(|pair| pair
            == [NotificationKind::Enter, NotificationKind::Exit]));
    }

    #[tokio::test]
    async fn test_shutdown_drains_slow_queue() {
        let store = Arc::new(RecordingStore::default());
        let dispatcher = SideEffectDispatcher::new(
            store.clone(),
            Arc::new(SlowNotifier(Duration::from_millis(200))),
            policy(Duration::from_millis(5)),
        );
        let worker = DispatchWorker::spawn(dispatcher, 1);

        let mut pipeline = PresencePipeline::new(&Config::default(), PipelineMetrics::new());
        for id in 0..4u64 {
            worker
                .submit(pipeline.process_frame(&[moto(id)], Utc::now()))
                .await
                .unwrap();
        }

        let summary = worker.shutdown().await.unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(store.records().len(), 4);
        assert_eq!(summary.calls_failed, 4);
    }
}
