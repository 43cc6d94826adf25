// LogIQ Detection - Windowed baselines and anomaly detection
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Engine state snapshots.
//!
//! Nothing is persisted implicitly; a caller that wants to survive a
//! restart exports the engine state and imports it into a fresh engine.

use crate::baseline::BaselinePhase;
use crate::error::{DetectError, Result};
use logiq::TemplateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Snapshot format version.
pub const SNAPSHOT_VERSION: &str = "0.1.0";

/// Exported baseline and seen-template state of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Format version.
    pub version: String,
    pub phase: BaselinePhase,
    pub learned_windows: u32,
    /// Global history, oldest first.
    pub history: Vec<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub template_histories: BTreeMap<TemplateId, Vec<u64>>,
    pub seen: Vec<TemplateId>,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and check the format version.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| DetectError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DetectError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self
            .to_json_pretty()
            .map_err(|e| DetectError::Snapshot(e.to_string()))?;
        fs::write(path.as_ref(), json).map_err(|e| {
            DetectError::Snapshot(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref()).map_err(|e| {
            DetectError::Snapshot(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EngineSnapshot {
        let mut template_histories = BTreeMap::new();
        template_histories.insert(TemplateId::of("Request <*> served"), vec![12, 14]);
        EngineSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            phase: BaselinePhase::Active,
            learned_windows: 5,
            history: vec![10, 10, 11, 10, 9],
            template_histories,
            seen: vec![TemplateId::of("Request <*> served")],
        }
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        assert_eq!(EngineSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_snapshot_rejects_other_version() {
        let mut snapshot = sample();
        snapshot.version = "9.9.9".to_string();
        let json = snapshot.to_json().unwrap();
        assert!(matches!(
            EngineSnapshot::from_json(&json),
            Err(DetectError::Snapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let snapshot = sample();
        snapshot.save(&path).unwrap();
        assert_eq!(EngineSnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineSnapshot::load(dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
