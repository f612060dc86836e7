// src/dispatch/persistence.rs
//
// Detection store collaborator. One position sample per tracked detection
// per frame, optionally carrying the accepted label.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub track_id: String,
    pub center_x: f32,
    pub center_y: f32,
    pub label: Option<String>,
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait DetectionStore: Send + Sync {
    fn name(&self) -> &str;

    async fn insert_detection(&self, record: &DetectionRecord) -> Result<(), CollaboratorError>;
}

/// Append-only JSON Lines detection log, one record per line.
pub struct JsonlDetectionStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlDetectionStore {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, CollaboratorError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DetectionStore for JsonlDetectionStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn insert_detection(&self, record: &DetectionRecord) -> Result<(), CollaboratorError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
