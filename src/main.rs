// src/main.rs

mod config;
mod dispatch;
mod error;
mod ingest;
mod lot_map;
mod pipeline;
mod presence;
mod replay;
mod types;

use anyhow::{Context, Result};
use chrono::Utc;
use dispatch::{
    CallTarget, DispatchPolicy, DispatchSummary, DispatchWorker, HttpNotifier, JsonlDetectionStore,
    LoggingNotifier, Notifier, SideEffectDispatcher,
};
use lot_map::LotMap;
use pipeline::{FrameResult, MetricsSummary, PipelineMetrics, PresencePipeline};
use replay::{RecordingReader, ReplaySource};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;

const CONFIG_ENV: &str = "LOT_PRESENCE_CONFIG";
const PROGRESS_EVERY_FRAMES: u64 = 500;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lot_presence={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🏍️  Lot Presence Tracker Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Notification mode: {}, dispatch timeout {:?}, {} attempt(s), {}",
        config.dispatch.notification_mode.as_str(),
        config.dispatch.dispatch_timeout(),
        config.dispatch.max_attempts,
        if config.dispatch.background {
            "background worker"
        } else {
            "inline dispatch"
        }
    );

    let notifier: Arc<dyn Notifier> = if config.notifier.enabled {
        let http = HttpNotifier::new(&config.notifier.base_url, config.dispatch.dispatch_timeout())?;
        info!("📡 Lot API endpoint: {}", http.endpoint());
        Arc::new(http)
    } else {
        info!("⚪ Remote notifier disabled, notifications go to the log");
        Arc::new(LoggingNotifier)
    };

    let source = ReplaySource::new(&config.replay);
    let recordings = source.find_recordings()?;
    if recordings.is_empty() {
        error!("No recordings found in {}", config.replay.input_dir);
        return Ok(());
    }

    let mut pipeline = PresencePipeline::new(&config, PipelineMetrics::new());

    for (idx, path) in recordings.iter().enumerate() {
        info!("========================================");
        info!(
            "Replaying session {}/{}: {}",
            idx + 1,
            recordings.len(),
            path.display()
        );
        info!("========================================");

        match process_recording(path, &source, &config, notifier.clone(), &mut pipeline).await {
            Ok(stats) => print_stats(&stats),
            Err(e) => error!("Failed to replay {}: {:#}", path.display(), e),
        }
    }

    Ok(())
}

struct SessionStats {
    metrics: MetricsSummary,
    dispatch: DispatchSummary,
    still_present: usize,
}

// ============================================================================
// DISPATCH SINK
// ============================================================================

/// Where finished frames go: dispatched in the frame loop, or queued to a
/// background worker.
enum DispatchSink {
    Inline {
        dispatcher: SideEffectDispatcher,
        summary: DispatchSummary,
    },
    Background(DispatchWorker),
}

impl DispatchSink {
    fn new(dispatcher: SideEffectDispatcher, config: &Config) -> Self {
        if config.dispatch.background {
            Self::Background(DispatchWorker::spawn(
                dispatcher,
                config.dispatch.queue_capacity,
            ))
        } else {
            Self::Inline {
                dispatcher,
                summary: DispatchSummary::default(),
            }
        }
    }

    async fn send(&mut self, frame: FrameResult) -> Result<()> {
        match self {
            Self::Background(worker) => worker.submit(frame).await,
            Self::Inline {
                dispatcher,
                summary,
            } => {
                let outcome = dispatcher.dispatch(&frame).await;
                if !outcome.all_ok() {
                    debug!(
                        "Frame {}: persistence {} ok / {} failed, notifications {} ok / {} failed",
                        outcome.frame_id,
                        outcome.succeeded(CallTarget::Persistence),
                        outcome.failed(CallTarget::Persistence),
                        outcome.succeeded(CallTarget::Notification),
                        outcome.failed(CallTarget::Notification)
                    );
                    for line in outcome.failure_lines() {
                        debug!("Frame {}: {}", outcome.frame_id, line);
                    }
                }
                summary.absorb(&outcome);
                Ok(())
            }
        }
    }

    /// Drain anything still queued and return the session's dispatch totals.
    async fn finish(self) -> Result<DispatchSummary> {
        match self {
            Self::Background(worker) => worker.shutdown().await,
            Self::Inline { summary, .. } => Ok(summary),
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

async fn process_recording(
    path: &Path,
    source: &ReplaySource,
    config: &Config,
    notifier: Arc<dyn Notifier>,
    pipeline: &mut PresencePipeline,
) -> Result<SessionStats> {
    let mut reader = source.open(path)?;

    let session_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("session");
    let output_dir = Path::new(&config.persistence.output_dir);
    let store_path = output_dir.join(format!("{}_detections.jsonl", session_name));
    let store = JsonlDetectionStore::create(&store_path)
        .await
        .with_context(|| format!("Failed to open detection store {}", store_path.display()))?;
    info!("💾 Detections will be written to: {}", store.path().display());

    let metrics = PipelineMetrics::new();
    pipeline.begin_session(metrics.clone());
    let dispatcher =
        SideEffectDispatcher::new(Arc::new(store), notifier, DispatchPolicy::from_config(config))
            .with_metrics(metrics.clone());
    let mut sink = DispatchSink::new(dispatcher, config);

    // Frames already handed to the sink are drained even when replay fails
    let replayed = replay_frames(&mut reader, pipeline, &metrics, &mut sink).await;
    let drained = sink.finish().await;
    replayed?;
    let dispatch_summary = drained?;

    let ledger = pipeline.ledger();
    let still_present = ledger.len();
    if !ledger.is_empty() {
        let ids: Vec<String> = ledger
            .present_ids()
            .iter()
            .map(|id| id.labelled(&config.tracking.track_label_prefix))
            .collect();
        warn!(
            "{} track(s) still on the lot at end of recording, no EXIT emitted: {}",
            still_present,
            ids.join(", ")
        );
    }

    LotMap::from_ledger(ledger, &config.tracking.track_label_prefix)
        .write(&output_dir.join(format!("{}_lot_map.json", session_name)))?;

    Ok(SessionStats {
        metrics: metrics.summary(),
        dispatch: dispatch_summary,
        still_present,
    })
}

async fn replay_frames(
    reader: &mut RecordingReader,
    pipeline: &mut PresencePipeline,
    metrics: &PipelineMetrics,
    sink: &mut DispatchSink,
) -> Result<()> {
    while let Some(recorded) = reader.read_frame()? {
        let timestamp = recorded.timestamp.unwrap_or_else(Utc::now);
        let source_frame = recorded.frame;
        let (raws, undecodable) = recorded.into_raw();
        let frame = pipeline.process_frame_with_undecodable(&raws, undecodable, timestamp);

        if let Some(source_frame) = source_frame {
            debug!(
                "Frame {} (source {}): {} detections, {} transitions",
                frame.frame_id,
                source_frame,
                frame.detections.len(),
                frame.transitions.len()
            );
        }

        if frame.frame_id % PROGRESS_EVERY_FRAMES == 0 {
            info!(
                "Progress: frame {} | {} on lot | {:.1} FPS",
                frame.frame_id,
                pipeline.present_count(),
                metrics.fps()
            );
        }

        sink.send(frame).await?;
    }
    Ok(())
}

fn print_stats(stats: &SessionStats) {
    let m = &stats.metrics;
    info!("✓ Session replayed successfully!");
    info!("  Total frames: {}", m.total_frames);
    info!(
        "  Detections: {} accepted, {} filtered, {} malformed",
        m.detections_accepted, m.detections_filtered, m.detections_rejected
    );
    info!("  🏷️  Trusted labels: {}", m.labels_accepted);
    info!("  🟢 Entries: {}", m.enters);
    info!("  🔴 Exits: {}", m.exits);
    info!("  🅿️  Still present: {}", stats.still_present);
    info!(
        "  💾 Persistence: {} ok, {} failed",
        m.persistence_successes, m.persistence_failures
    );
    info!(
        "  📣 Notifications: {} ok, {} failed",
        m.notification_successes, m.notification_failures
    );
    if m.dispatch_timeouts > 0 {
        warn!("  ⏱️  Dispatch timeouts: {}", m.dispatch_timeouts);
    }
    info!(
        "  Dispatch: {} frames, {} calls ok, {} calls failed, {} retried",
        stats.dispatch.frames,
        stats.dispatch.calls_ok,
        stats.dispatch.calls_failed,
        stats.dispatch.calls_retried
    );
    info!(
        "  Processing Speed: {:.1} FPS over {:.1}s",
        m.fps, m.elapsed_secs
    );
}
