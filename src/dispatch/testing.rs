// src/dispatch/testing.rs
//
// In-memory collaborators for dispatcher and worker tests.

use super::notifier::{Notification, Notifier};
use super::persistence::{DetectionRecord, DetectionStore};
use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingStore {
    records: Mutex<Vec<DetectionRecord>>,
}

impl RecordingStore {
    pub fn records(&self) -> Vec<DetectionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DetectionStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn insert_detection(&self, record: &DetectionRecord) -> Result<(), CollaboratorError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub struct FailingStore;

#[async_trait]
impl DetectionStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn insert_detection(&self, _record: &DetectionRecord) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk unavailable",
        )))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &str {
        "failing"
    }

    async fn notify(&self, _notification: &Notification) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Status(503))
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowNotifier(pub Duration);

#[async_trait]
impl Notifier for SlowNotifier {
    fn name(&self) -> &str {
        "slow"
    }

    async fn notify(&self, _notification: &Notification) -> Result<(), CollaboratorError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Fails the first `n` calls, then succeeds.
pub struct FlakyNotifier {
    remaining_failures: AtomicU32,
    attempts: Mutex<Vec<Uuid>>,
}

impl FlakyNotifier {
    pub fn failing_first(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempted_event_ids(&self) -> Vec<Uuid> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FlakyNotifier {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError> {
        self.attempts.lock().unwrap().push(notification.event_id);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(CollaboratorError::Transport("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}
