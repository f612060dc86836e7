// src/ingest.rs
//
// Boundary between the external tracker and the presence core.
// Every record is validated here; nothing malformed reaches the reconciler.
// Low-confidence and off-class records are filtered (not errors), exactly
// like the tracker's own `conf=` / `classes=` arguments would.

use crate::error::IngestError;
use crate::types::{BoundingBox, Detection, RawDetection, TrackId, TrackingConfig};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct IngestFilter {
    tracking_threshold: f32,
    target_class_ids: Vec<u32>,
}

/// Result of ingesting one frame of tracker output.
#[derive(Debug, Clone, Default)]
pub struct IngestBatch {
    /// Valid detections, one per track id, in tracker order
    pub detections: Vec<Detection>,
    /// Malformed records skipped
    pub rejected: usize,
    /// Records below the tracking threshold or outside the target classes
    pub filtered: usize,
}

impl IngestFilter {
    pub fn new(tracking_threshold: f32, target_class_ids: Vec<u32>) -> Self {
        Self {
            tracking_threshold,
            target_class_ids,
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(
            config.tracking_confidence_threshold,
            config.target_class_ids.clone(),
        )
    }

    /// Validate a single record. `Ok(None)` means well-formed but filtered out.
    pub fn admit(&self, raw: &RawDetection) -> Result<Option<Detection>, IngestError> {
        let track_id = raw.track_id.map(TrackId).ok_or(IngestError::MissingTrackId)?;
        let bbox = BoundingBox::from_slice(&raw.bbox)?;
        let confidence = raw.confidence.ok_or(IngestError::MissingConfidence)?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(IngestError::InvalidConfidence(confidence));
        }

        if confidence < self.tracking_threshold {
            return Ok(None);
        }
        if !self.target_class_ids.is_empty() {
            match raw.class_id {
                Some(class_id) if self.target_class_ids.contains(&class_id) => {}
                _ => return Ok(None),
            }
        }

        Ok(Some(Detection {
            track_id,
            bbox,
            tracking_confidence: confidence,
            class_id: raw.class_id,
            classification: raw.classification.clone(),
        }))
    }

    pub fn ingest(&self, raws: &[RawDetection]) -> IngestBatch {
        let mut batch = IngestBatch::default();
        let mut seen = HashSet::with_capacity(raws.len());

        for raw in raws {
            match self.admit(raw) {
                Ok(Some(detection)) => {
                    if seen.insert(detection.track_id) {
                        batch.detections.push(detection);
                    } else {
                        debug!(
                            "Duplicate {} in one frame, keeping first occurrence",
                            detection.track_id
                        );
                    }
                }
                Ok(None) => batch.filtered += 1,
                Err(e) => {
                    warn!("⚠️  Skipping malformed detection {:?}: {}", raw.track_id, e);
                    batch.rejected += 1;
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassificationResult;

    fn raw(id: Option<u64>, bbox: [f32; 4], conf: f32, class_id: Option<u32>) -> RawDetection {
        RawDetection {
            track_id: id,
            bbox: bbox.to_vec(),
            confidence: Some(conf),
            class_id,
            classification: None,
        }
    }

    fn filter() -> IngestFilter {
        IngestFilter::new(0.5, vec![3])
    }

    #[test]
    fn test_valid_detection_center() {
        let det = filter()
            .admit(&raw(Some(7), [100.0, 200.0, 140.0, 260.0], 0.9, Some(3)))
            .unwrap()
            .unwrap();
        assert_eq!(det.track_id, TrackId(7));
        assert_eq!(det.center().x, 120.0);
        assert_eq!(det.center().y, 230.0);
        assert_eq!(det.tracking_confidence, 0.9);
    }

    #[test]
    fn test_malformed_records_rejected() {
        let f = filter();
        assert_eq!(
            f.admit(&raw(None, [0.0, 0.0, 10.0, 10.0], 0.9, Some(3))),
            Err(IngestError::MissingTrackId)
        );
        assert!(matches!(
            f.admit(&raw(Some(1), [10.0, 0.0, 10.0, 10.0], 0.9, Some(3))),
            Err(IngestError::DegenerateBox { .. })
        ));
        assert!(matches!(
            f.admit(&raw(Some(1), [0.0, 12.0, 10.0, 4.0], 0.9, Some(3))),
            Err(IngestError::DegenerateBox { .. })
        ));
        assert_eq!(
            f.admit(&raw(Some(1), [0.0, 0.0, f32::INFINITY, 10.0], 0.9, Some(3))),
            Err(IngestError::NonFiniteCoordinates)
        );
        assert_eq!(
            f.admit(&raw(Some(1), [0.0, 0.0, 10.0, 10.0], 1.5, Some(3))),
            Err(IngestError::InvalidConfidence(1.5))
        );
    }

    #[test]
    fn test_shape_errors_rejected_per_detection() {
        let f = filter();
        let mut short_box = raw(Some(8), [0.0, 0.0, 10.0, 10.0], 0.9, Some(3));
        short_box.bbox = vec![10.0, 20.0, 60.0];
        assert_eq!(f.admit(&short_box), Err(IngestError::BadBoxArity(3)));

        let mut no_box = raw(Some(8), [0.0, 0.0, 10.0, 10.0], 0.9, Some(3));
        no_box.bbox.clear();
        assert_eq!(f.admit(&no_box), Err(IngestError::BadBoxArity(0)));

        let mut no_conf = raw(Some(8), [0.0, 0.0, 10.0, 10.0], 0.9, Some(3));
        no_conf.confidence = None;
        assert_eq!(f.admit(&no_conf), Err(IngestError::MissingConfidence));

        let batch = f.ingest(&[
            raw(Some(7), [10.0, 20.0, 60.0, 120.0], 0.9, Some(3)),
            short_box,
            no_conf,
        ]);
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].track_id, TrackId(7));
        assert_eq!(batch.rejected, 2);
    }

    #[test]
    fn test_threshold_and_class_filtering() {
        let f = filter();
        assert_eq!(
            f.admit(&raw(Some(1), [0.0, 0.0, 10.0, 10.0], 0.49, Some(3))),
            Ok(None)
        );
        assert!(f
            .admit(&raw(Some(1), [0.0, 0.0, 10.0, 10.0], 0.5, Some(3)))
            .unwrap()
            .is_some());
        assert_eq!(
            f.admit(&raw(Some(1), [0.0, 0.0, 10.0, 10.0], 0.9, Some(2))),
            Ok(None)
        );
        assert_eq!(
            f.admit(&raw(Some(1), [0.0, 0.0, 10.0, 10.0], 0.9, None)),
            Ok(None)
        );

        let any_class = IngestFilter::new(0.5, vec![]);
        assert!(any_class
            .admit(&raw(Some(1), [0.0, 0.0, 10.0, 10.0], 0.9, None))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_malformed_record_does_not_abort_frame() {
        let raws = vec![
            raw(Some(1), [0.0, 0.0, 10.0, 10.0], 0.9, Some(3)),
            raw(Some(2), [5.0, 5.0, 5.0, 5.0], 0.9, Some(3)),
            raw(Some(3), [20.0, 0.0, 30.0, 10.0], 0.2, Some(3)),
            raw(Some(4), [40.0, 0.0, 50.0, 10.0], 0.8, Some(3)),
        ];
        let batch = filter().ingest(&raws);
        let ids: Vec<_> = batch.detections.iter().map(|d| d.track_id).collect();
        assert_eq!(ids, vec![TrackId(1), TrackId(4)]);
        assert_eq!(batch.rejected, 1);
        assert_eq!(batch.filtered, 1);
    }

    #[test]
    fn test_duplicate_track_keeps_first() {
        let mut second = raw(Some(9), [50.0, 50.0, 70.0, 70.0], 0.9, Some(3));
        second.classification = Some(ClassificationResult {
            label: "4411".to_string(),
            confidence: 0.95,
        });
        let raws = vec![raw(Some(9), [0.0, 0.0, 10.0, 10.0], 0.9, Some(3)), second];

        let batch = filter().ingest(&raws);
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].center().x, 5.0);
        assert!(batch.detections[0].classification.is_none());
    }
}
