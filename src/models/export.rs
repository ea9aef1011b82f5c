use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::packet::PacketRecord;
use crate::models::session::SessionInfo;
use crate::models::stats::AggregateStats;
use crate::utils::error::CaptureResult;

/// Interchange document holding a packet snapshot and the matching statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub session: Option<SessionInfo>,
    pub stats: AggregateStats,
    pub packets: Vec<PacketRecord>,
}

impl ExportDocument {
    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> CaptureResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a previously exported document
    pub fn from_json(text: &str) -> CaptureResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the document into `dir`, creating it if needed, and return the file path
    pub fn write_to(&self, dir: &Path) -> CaptureResult<PathBuf> {
        fs::create_dir_all(dir)?;

        let file_name = format!(
            "packets_{}.json",
            self.exported_at.format("%Y%m%d_%H%M%S%.3f")
        );
        let path = dir.join(file_name);
        fs::write(&path, self.to_json()?)?;

        info!("Exported {} packets to {}", self.packets.len(), path.display());
        Ok(path)
    }
}
