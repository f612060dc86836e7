// src/replay.rs
//
// Recorded tracker output, one JSON object per line:
//
//   {"frame": 12, "timestamp": "2024-05-01T10:00:00Z", "detections": [ ... ]}
//
// Each file is replayed as its own tracking session.

use crate::types::{RawDetection, ReplayConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedFrame {
    /// Source frame number, informational only
    #[serde(default)]
    pub frame: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detections: Vec<RecordedDetection>,
}

/// A detection whose fields have the wrong JSON types is kept as raw JSON,
/// so one bad record never fails the whole line.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordedDetection {
    Decoded(RawDetection),
    Undecodable(serde_json::Value),
}

impl RecordedFrame {
    /// Decoded tracker records, plus how many could not be decoded at all.
    pub fn into_raw(self) -> (Vec<RawDetection>, usize) {
        let mut raws = Vec::with_capacity(self.detections.len());
        let mut undecodable = 0;
        for detection in self.detections {
            match detection {
                RecordedDetection::Decoded(raw) => raws.push(raw),
                RecordedDetection::Undecodable(_) => undecodable += 1,
            }
        }
        (raws, undecodable)
    }
}

pub struct ReplaySource {
    input_dir: PathBuf,
}

impl ReplaySource {
    pub fn new(config: &ReplayConfig) -> Self {
        Self {
            input_dir: PathBuf::from(&config.input_dir),
        }
    }

    pub fn find_recordings(&self) -> Result<Vec<PathBuf>> {
        if !self.input_dir.exists() {
            anyhow::bail!("Replay directory not found: {}", self.input_dir.display());
        }

        let mut recordings: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
            })
            .collect();
        recordings.sort();

        info!("Found {} recordings", recordings.len());
        Ok(recordings)
    }

    pub fn open(&self, path: &Path) -> Result<RecordingReader> {
        info!("Opening recording: {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("Failed to open recording {}", path.display()))?;
        Ok(RecordingReader {
            path: path.to_path_buf(),
            lines: BufReader::new(file),
            line_number: 0,
        })
    }
}

pub struct RecordingReader {
    path: PathBuf,
    lines: BufReader<File>,
    line_number: usize,
}

impl RecordingReader {
    /// Next recorded frame, or `None` at end of file. Blank lines are skipped;
    /// a line that does not parse is an error.
    pub fn read_frame(&mut self) -> Result<Option<RecordedFrame>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .lines
                .read_line(&mut line)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame: RecordedFrame = serde_json::from_str(trimmed).with_context(|| {
                format!(
                    "Invalid frame at {}:{}",
                    self.path.display(),
                    self.line_number
                )
            })?;
            for detection in &frame.detections {
                if let RecordedDetection::Undecodable(value) = detection {
                    warn!(
                        "⚠️  Undecodable detection at {}:{}: {}",
                        self.path.display(),
                        self.line_number,
                        value
                    );
                }
            }
            return Ok(Some(frame));
        }
    }
}
