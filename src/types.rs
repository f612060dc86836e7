// src/types.rs

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub classification: ClassificationConfig,
    pub dispatch: DispatchConfig,
    pub notifier: NotifierConfig,
    pub persistence: PersistenceConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum tracker confidence for a detection to count at all
    pub tracking_confidence_threshold: f32,
    /// Consecutive absent frames tolerated before a track is declared gone
    pub exit_frame_threshold: u32,
    /// Tracker class ids to keep (COCO: 3 = motorcycle). Empty keeps everything.
    pub target_class_ids: Vec<u32>,
    /// Prefix used when a track id is handed to collaborators ("moto" -> "moto_7")
    pub track_label_prefix: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_confidence_threshold: 0.5,
            exit_frame_threshold: 15,
            target_class_ids: vec![3],
            track_label_prefix: "moto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub classification_confidence_threshold: f32,
    /// Keep only ASCII digits of an accepted label (plate-number OCR output)
    pub digits_only: bool,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            classification_confidence_threshold: 0.8,
            digits_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    /// Notify only on ENTER / EXIT transitions
    #[default]
    Transition,
    /// Notify every frame for every present, confidently classified detection
    Continuous,
}

impl NotificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transition => "transition",
            Self::Continuous => "continuous",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub notification_mode: NotificationMode,
    pub dispatch_timeout_ms: u64,
    /// Attempts per call within one frame. Retries never cross frames.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Run side effects on a background task instead of inline in the frame loop
    pub background: bool,
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            notification_mode: NotificationMode::Transition,
            dispatch_timeout_ms: 5000,
            max_attempts: 1,
            retry_backoff_ms: 100,
            background: false,
            queue_capacity: 64,
        }
    }
}

impl DispatchConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:5000/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub output_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// DETECTIONS
// ============================================================================

/// Tracker-assigned identifier, stable for one physical object within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl TrackId {
    /// Collaborator-facing name, e.g. `moto_7`.
    pub fn labelled(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pixel rectangle with `x1 < x2` and `y1 < y2`. Only built through [`BoundingBox::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self, IngestError> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(IngestError::NonFiniteCoordinates);
        }
        if x1 >= x2 || y1 >= y2 {
            return Err(IngestError::DegenerateBox { x1, y1, x2, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn from_slice(coords: &[f32]) -> Result<Self, IngestError> {
        match *coords {
            [x1, y1, x2, y2] => Self::new(x1, y1, x2, y2),
            _ => Err(IngestError::BadBoxArity(coords.len())),
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

/// One tracker output tuple as it arrives, before any validation. Shape
/// problems (wrong box arity, missing confidence) are left for ingest to
/// reject per detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub track_id: Option<u64>,
    /// [x1, y1, x2, y2] pixels
    #[serde(default)]
    pub bbox: Vec<f32>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub classification: Option<ClassificationResult>,
}

/// A validated detection for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub track_id: TrackId,
    pub bbox: BoundingBox,
    pub tracking_confidence: f32,
    pub class_id: Option<u32>,
    pub classification: Option<ClassificationResult>,
}

impl Detection {
    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// A detection after the classification gate: the label is present only when accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatedDetection {
    pub track_id: TrackId,
    pub center: Point,
    pub label: Option<String>,
}

// ============================================================================
// TRANSITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransitionKind {
    Enter,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    pub track_id: TrackId,
    pub kind: TransitionKind,
    pub frame_sequence_number: u64,
    /// Center at entry, or last known center for an exit
    pub center: Point,
    /// Most recent accepted label for the track, if any
    pub label: Option<String>,
}
