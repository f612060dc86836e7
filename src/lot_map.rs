// src/lot_map.rs
//
// End-of-session snapshot of what is still on the lot:
//
//   {"motos": [{"id": "4412", "x": 130, "y": 260}, {"id": "moto_12", ...}]}
//
// The id is the accepted label when one was read, otherwise the prefixed
// track id. Coordinates are the last known center, in whole pixels.

use crate::presence::PresenceLedger;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotMapEntry {
    pub id: String,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LotMap {
    #[serde(rename = "motos")]
    pub vehicles: Vec<LotMapEntry>,
}

impl LotMap {
    pub fn from_ledger(ledger: &PresenceLedger, track_label_prefix: &str) -> Self {
        let vehicles = ledger
            .entries()
            .map(|entry| LotMapEntry {
                id: entry
                    .label
                    .clone()
                    .unwrap_or_else(|| entry.track_id.labelled(track_label_prefix)),
                x: entry.last_known_center.x.floor() as i64,
                y: entry.last_known_center.y.floor() as i64,
            })
            .collect();
        Self { vehicles }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize lot map")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(
            "🗺️  Lot map with {} vehicle(s) written to: {}",
            self.vehicles.len(),
            path.display()
        );
        Ok(())
    }
}
