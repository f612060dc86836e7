// src/dispatch/dispatcher.rs
//
// Turns a reconciled frame into collaborator calls:
//   - one detection insert per gated detection
//   - notifications per NotificationMode (transitions, or per-frame status)
//
// Every call runs under its own timeout. Failures are logged, counted, and
// recorded in the outcome; they never abort the frame and never touch the
// presence ledger. Retries (if configured) stay inside the frame.

use super::notifier::{Notification, NotificationKind, Notifier};
use super::persistence::{DetectionRecord, DetectionStore};
use crate::error::CollaboratorError;
use crate::pipeline::{FrameResult, PipelineMetrics};
use crate::types::{Config, NotificationMode, TrackId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub mode: NotificationMode,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub track_label_prefix: String,
}

impl DispatchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.dispatch.notification_mode,
            timeout: config.dispatch.dispatch_timeout(),
            max_attempts: config.dispatch.max_attempts.max(1),
            retry_backoff: config.dispatch.retry_backoff(),
            track_label_prefix: config.tracking.track_label_prefix.clone(),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Persistence,
    Notification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    Ok,
    Failed(FailureKind),
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub target: CallTarget,
    pub track_id: TrackId,
    /// Set for notification calls
    pub kind: Option<NotificationKind>,
    pub attempts: u32,
    pub result: CallResult,
}

impl CallRecord {
    pub fn is_ok(&self) -> bool {
        self.result == CallResult::Ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub frame_id: u64,
    pub calls: Vec<CallRecord>,
}

impl DispatchOutcome {
    pub fn succeeded(&self, target: CallTarget) -> usize {
        self.calls
            .iter()
            .filter(|c| c.target == target && c.is_ok())
            .count()
    }

    pub fn failed(&self, target: CallTarget) -> usize {
        self.calls
            .iter()
            .filter(|c| c.target == target && !c.is_ok())
            .count()
    }

    pub fn all_ok(&self) -> bool {
        self.calls.iter().all(CallRecord::is_ok)
    }

    /// One line per failed call, e.g. `notification ENTER for track_4 (timeout, 2 attempts)`.
    pub fn failure_lines(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| {
                let reason = match &call.result {
                    CallResult::Ok => return None,
                    CallResult::Failed(FailureKind::Timeout) => "timeout".to_string(),
                    CallResult::Failed(FailureKind::Error(e)) => e.clone(),
                };
                let what = match (call.target, call.kind) {
                    (CallTarget::Notification, Some(kind)) => {
                        format!("notification {}", kind.as_str())
                    }
                    (CallTarget::Notification, None) => "notification".to_string(),
                    (CallTarget::Persistence, _) => "persistence".to_string(),
                };
                Some(format!(
                    "{} for {} ({}, {} attempts)",
                    what, call.track_id, reason, call.attempts
                ))
            })
            .collect()
    }
}

/// Running totals across frames, for end-of-session reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub frames: u64,
    pub calls_ok: u64,
    pub calls_failed: u64,
    /// Calls that needed more than one attempt, whatever their result
    pub calls_retried: u64,
}

impl DispatchSummary {
    pub fn absorb(&mut self, outcome: &DispatchOutcome) {
        self.frames += 1;
        for call in &outcome.calls {
            if call.attempts > 1 {
                self.calls_retried += 1;
            }
            if call.is_ok() {
                self.calls_ok += 1;
            } else {
                self.calls_failed += 1;
            }
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct SideEffectDispatcher {
    store: Arc<dyn DetectionStore>,
    notifier: Arc<dyn Notifier>,
    policy: DispatchPolicy,
    metrics: Option<PipelineMetrics>,
}

impl SideEffectDispatcher {
    pub fn new(
        store: Arc<dyn DetectionStore>,
        notifier: Arc<dyn Notifier>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn dispatch(&self, frame: &FrameResult) -> DispatchOutcome {
        let mut outcome = DispatchOutcome {
            frame_id: frame.frame_id,
            calls: Vec::with_capacity(frame.detections.len() + frame.transitions.len()),
        };

        for det in &frame.detections {
            let record = DetectionRecord {
                track_id: det.track_id.labelled(&self.policy.track_label_prefix),
                center_x: det.center.x,
                center_y: det.center.y,
                label: det.label.clone(),
                frame_id: frame.frame_id,
                timestamp: frame.timestamp,
            };
            let store = &self.store;
            let record_ref = &record;
            let (attempts, result) = self
                .call(move || store.insert_detection(record_ref))
                .await;
            outcome.calls.push(self.settle(
                CallTarget::Persistence,
                det.track_id,
                None,
                attempts,
                result,
            ));
        }

        for (track_id, notification) in self.notifications_for(frame) {
            let notifier = &self.notifier;
            let notification_ref = &notification;
            let (attempts, result) = self
                .call(move || notifier.notify(notification_ref))
                .await;
            outcome.calls.push(self.settle(
                CallTarget::Notification,
                track_id,
                Some(notification.kind),
                attempts,
                result,
            ));
        }

        outcome
    }

    fn notifications_for(&self, frame: &FrameResult) -> Vec<(TrackId, Notification)> {
        let prefix = &self.policy.track_label_prefix;
        match self.policy.mode {
            NotificationMode::Transition => frame
                .transitions
                .iter()
                .map(|t| {
                    (
                        t.track_id,
                        Notification {
                            event_id: Uuid::new_v4(),
                            kind: t.kind.into(),
                            track_id: t.track_id.labelled(prefix),
                            label: t.label.clone(),
                            center: Some(t.center),
                            timestamp: frame.timestamp,
                        },
                    )
                })
                .collect(),
            NotificationMode::Continuous => frame
                .labelled_detections()
                .map(|d| {
                    (
                        d.track_id,
                        Notification {
                            event_id: Uuid::new_v4(),
                            kind: NotificationKind::Status,
                            track_id: d.track_id.labelled(prefix),
                            label: d.label.clone(),
                            center: Some(d.center),
                            timestamp: frame.timestamp,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Run one collaborator call under the timeout, retrying within the frame.
    async fn call<F, Fut>(&self, mut op: F) -> (u32, Result<(), CollaboratorError>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), CollaboratorError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(()) => return (attempt, Ok(())),
                Err(e) if attempt < self.policy.max_attempts => {
                    debug!(
                        "Attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, self.policy.max_attempts, e, self.policy.retry_backoff
                    );
                    tokio::time::sleep(self.policy.retry_backoff).await;
                }
                Err(e) => return (attempt, Err(e)),
            }
        }
    }

    fn settle(
        &self,
        target: CallTarget,
        track_id: TrackId,
        kind: Option<NotificationKind>,
        attempts: u32,
        result: Result<(), CollaboratorError>,
    ) -> CallRecord {
        let result = match result {
            Ok(()) => {
                self.count(target, true, false);
                CallResult::Ok
            }
            Err(e) => {
                let collaborator = match target {
                    CallTarget::Persistence => self.store.name(),
                    CallTarget::Notification => self.notifier.name(),
                };
                warn!(
                    track_id = %track_id,
                    collaborator,
                    kind = kind.map(|k| k.as_str()).unwrap_or("-"),
                    attempts,
                    error = %e,
                    "Side effect failed, dropping for this frame"
                );
                self.count(target, false, e.is_timeout());
                if e.is_timeout() {
                    CallResult::Failed(FailureKind::Timeout)
                } else {
                    CallResult::Failed(FailureKind::Error(e.to_string()))
                }
            }
        };

        CallRecord {
            target,
            track_id,
            kind,
            attempts,
            result,
        }
    }

    fn count(&self, target: CallTarget, ok: bool, timed_out: bool) {
        let Some(m) = &self.metrics else {
            return;
        };
        let counter = match (target, ok) {
            (CallTarget::Persistence, true) => &m.persistence_successes,
            (CallTarget::Persistence, false) => &m.persistence_failures,
            (CallTarget::Notification, true) => &m.notification_successes,
            (CallTarget::Notification, false) => &m.notification_failures,
        };
        m.inc(counter);
        if timed_out {
            m.inc(&m.dispatch_timeouts);
        }
    }
}
