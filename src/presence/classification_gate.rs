// src/presence/classification_gate.rs
//
// Decides whether a classification label can be attached to a detection.
// Gates only the label path: a rejected detection is still tracked for
// presence exactly like an accepted one.

use crate::types::{ClassificationConfig, ClassificationResult, Detection, GatedDetection};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelDecision {
    Accepted(String),
    Rejected,
}

impl LabelDecision {
    pub fn into_label(self) -> Option<String> {
        match self {
            Self::Accepted(label) => Some(label),
            Self::Rejected => None,
        }
    }
}

/// Accepted iff a result is present and its confidence clears `threshold`.
pub fn accept(result: Option<&ClassificationResult>, threshold: f32) -> LabelDecision {
    match result {
        Some(r) if (0.0..=1.0).contains(&r.confidence) && r.confidence >= threshold => {
            LabelDecision::Accepted(r.label.clone())
        }
        _ => LabelDecision::Rejected,
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationGate {
    threshold: f32,
    digits_only: bool,
}

impl ClassificationGate {
    pub fn new(threshold: f32, digits_only: bool) -> Self {
        Self {
            threshold,
            digits_only,
        }
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self::new(
            config.classification_confidence_threshold,
            config.digits_only,
        )
    }

    /// [`accept`] plus label clean-up. A label that is empty once cleaned is rejected.
    pub fn decide(&self, result: Option<&ClassificationResult>) -> LabelDecision {
        match accept(result, self.threshold) {
            LabelDecision::Accepted(raw) => {
                let label = normalize_label(&raw, self.digits_only);
                if label.is_empty() {
                    debug!("Classifier label {:?} empty after clean-up, rejecting", raw);
                    LabelDecision::Rejected
                } else {
                    LabelDecision::Accepted(label)
                }
            }
            LabelDecision::Rejected => LabelDecision::Rejected,
        }
    }

    pub fn gate(&self, detection: &Detection) -> GatedDetection {
        GatedDetection {
            track_id: detection.track_id,
            center: detection.center(),
            label: self.decide(detection.classification.as_ref()).into_label(),
        }
    }
}

fn normalize_label(raw: &str, digits_only: bool) -> String {
    if digits_only {
        raw.chars().filter(|c| c.is_ascii_digit()).collect()
    } else {
        raw.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, TrackId};

    fn result(label: &str, confidence: f32) -> ClassificationResult {
        ClassificationResult {
            label: label.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_accept_threshold_is_inclusive() {
        assert_eq!(
            accept(Some(&result("A1", 0.8)), 0.8),
            LabelDecision::Accepted("A1".to_string())
        );
        assert_eq!(accept(Some(&result("A1", 0.79)), 0.8), LabelDecision::Rejected);
        assert_eq!(accept(None, 0.0), LabelDecision::Rejected);
    }

    #[test]
    fn test_accept_rejects_invalid_confidence() {
        assert_eq!(accept(Some(&result("A1", f32::NAN)), 0.1), LabelDecision::Rejected);
        assert_eq!(accept(Some(&result("A1", 1.7)), 0.1), LabelDecision::Rejected);
    }

    #[test]
    fn test_digits_only_cleanup() {
        let gate = ClassificationGate::new(0.5, true);
        assert_eq!(
            gate.decide(Some(&result(" 12-34\n", 0.9))),
            LabelDecision::Accepted("1234".to_string())
        );
        assert_eq!(gate.decide(Some(&result("ABC", 0.9))), LabelDecision::Rejected);

        let free_text = ClassificationGate::new(0.5, false);
        assert_eq!(
            free_text.decide(Some(&result("  Honda CG 160 ", 0.9))),
            LabelDecision::Accepted("Honda CG 160".to_string())
        );
        assert_eq!(free_text.decide(Some(&result("   ", 0.9))), LabelDecision::Rejected);
    }

    #[test]
    fn test_low_confidence_detection_stays_unlabelled() {
        let gate = ClassificationGate::new(0.8, true);
        let detection = Detection {
            track_id: TrackId(9),
            bbox: BoundingBox::new(10.0, 10.0, 30.0, 50.0).unwrap(),
            tracking_confidence: 0.9,
            class_id: Some(3),
            classification: Some(result("5521", 0.62)),
        };

        let gated = gate.gate(&detection);
        assert_eq!(gated.track_id, TrackId(9));
        assert_eq!(gated.center.x, 20.0);
        assert_eq!(gated.center.y, 30.0);
        assert!(gated.label.is_none());
        assert_eq!(
            gate.decide(detection.classification.as_ref()),
            LabelDecision::Rejected
        );
    }
}
