// src/config.rs

use crate::error::ConfigError;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

/// Absence counts saturate at `u32::MAX`; a threshold there could never be exceeded.
const MAX_EXIT_FRAME_THRESHOLD: u32 = u32::MAX;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval(
            "tracking_confidence_threshold",
            self.tracking.tracking_confidence_threshold,
        )?;
        check_unit_interval(
            "classification_confidence_threshold",
            self.classification.classification_confidence_threshold,
        )?;

        if self.tracking.exit_frame_threshold == 0 {
            return Err(ConfigError::ZeroExitThreshold);
        }
        if self.tracking.exit_frame_threshold >= MAX_EXIT_FRAME_THRESHOLD {
            return Err(ConfigError::ExitThresholdTooLarge {
                value: self.tracking.exit_frame_threshold,
                max: MAX_EXIT_FRAME_THRESHOLD,
            });
        }
        if self.dispatch.dispatch_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.dispatch.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.notifier.enabled && self.notifier.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(())
    }
}

fn check_unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { field, value })
    }
}
