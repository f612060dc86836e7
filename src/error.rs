// src/error.rs

use std::time::Duration;
use thiserror::Error;

/// A tracker record that cannot be turned into a [`crate::types::Detection`].
/// Rejected at ingestion; the rest of the frame is still processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("detection has no track id")]
    MissingTrackId,

    #[error("degenerate bounding box [{x1}, {y1}, {x2}, {y2}]")]
    DegenerateBox { x1: f32, y1: f32, x2: f32, y2: f32 },

    #[error("bounding box has non-finite coordinates")]
    NonFiniteCoordinates,

    #[error("bounding box has {0} coordinates, expected 4")]
    BadBoxArity(usize),

    #[error("detection has no tracking confidence")]
    MissingConfidence,

    #[error("tracking confidence {0} outside [0, 1]")]
    InvalidConfidence(f32),
}

/// Failure of a persistence or notification call. Always recovered by the dispatcher.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Transport(e.to_string()),
        }
    }
}

impl CollaboratorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f32 },

    #[error("exit_frame_threshold must be at least 1")]
    ZeroExitThreshold,

    #[error("exit_frame_threshold must be below {max}, got {value}")]
    ExitThresholdTooLarge { value: u32, max: u32 },

    #[error("dispatch_timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("notifier.base_url is required when the notifier is enabled")]
    MissingBaseUrl,
}
