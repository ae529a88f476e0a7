//! Persistent memory for Kavram
//!
//! Everything the engine learned, as one snapshot: one node array per
//! grid layer and side, the association list and the training examples.
//! Snapshots are written with bincode; a JSON export exists for
//! inspection.

pub mod history;
pub mod notes;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use kavram_core::{Association, KavramError, KavramResult, TokenNode, TrainingExample, SNAPSHOT_VERSION};

use crate::engine::EngineCounters;

/// Complete engine state at one point in time
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Snapshot {
    /// Format version (for future migrations)
    pub version: u32,

    /// Unix millis of the capture
    pub saved_at: u64,

    /// One array per layer, row-major
    pub query_layers: Vec<Vec<TokenNode>>,
    pub response_layers: Vec<Vec<TokenNode>>,

    /// Forced evictions per side so far
    pub query_evictions: u64,
    pub response_evictions: u64,

    /// In id order
    pub associations: Vec<Association>,

    /// In recording order
    pub examples: Vec<TrainingExample>,

    /// Lifetime counters
    pub stats: EngineCounters,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: 0,
            query_layers: Vec::new(),
            response_layers: Vec::new(),
            query_evictions: 0,
            response_evictions: 0,
            associations: Vec::new(),
            examples: Vec::new(),
            stats: EngineCounters::default(),
        }
    }
}

impl Snapshot {
    /// Total nodes on both sides
    pub fn node_count(&self) -> usize {
        self.query_layers.iter().chain(&self.response_layers).map(Vec::len).sum()
    }

    /// Read a snapshot, failing on any error
    pub fn load(path: &Path) -> KavramResult<Self> {
        let data = fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&data)
            .map_err(|e| KavramError::snapshot(format!("{}: {}", path.display(), e)))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(KavramError::snapshot(format!(
                "{}: format version {} is newer than {}",
                path.display(),
                snapshot.version,
                SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Read a snapshot, or start empty when it is missing or unreadable
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(snapshot) => {
                    tracing::info!(
                        "Snapshot loaded: {} nodes, {} associations, {} examples",
                        snapshot.node_count(),
                        snapshot.associations.len(),
                        snapshot.examples.len()
                    );
                    return snapshot;
                }
                Err(e) => {
                    tracing::warn!("Snapshot unreadable, starting fresh: {}", e);
                }
            }
        }

        tracing::info!("Creating new memory");
        Self::default()
    }

    pub fn save(&self, path: &Path) -> KavramResult<()> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = bincode::serialize(self).map_err(|e| KavramError::snapshot(e.to_string()))?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Human-readable dump of the whole snapshot
    pub fn export_json(&self, path: &Path) -> KavramResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| KavramError::snapshot(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavram_core::{AssociationId, NodeId, Side};

    fn sample() -> Snapshot {
        let mut elma = TokenNode::new(NodeId(0), "elma", Side::Query, 0, 3, 4, 0.5, 10.0, 1);
        let armut = TokenNode::new(NodeId(1), "armut", Side::Query, 0, 5, 1, 0.5, 10.0, 1);
        elma.connect(armut.id, 0.5);
        Snapshot {
            query_layers: vec![vec![elma, armut]],
            associations: vec![Association::new(AssociationId(0), "elma", "meyvedir", 1, 1)],
            examples: vec![TrainingExample::new("elma nedir", "bir meyvedir", 1)],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kavram.bin");

        sample().save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();

        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.query_layers[0][0].token, "elma");
        assert_eq!(loaded.query_layers[0][0].connections[&NodeId(1)], 0.5);
        assert_eq!(loaded.associations[0].response_token, "meyvedir");
        assert_eq!(loaded.examples[0].response, "bir meyvedir");
    }

    #[test]
    fn test_load_or_create_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kavram.bin");
        fs::write(&path, b"not a snapshot").unwrap();

        assert!(matches!(Snapshot::load(&path), Err(KavramError::Snapshot(_))));
        let fresh = Snapshot::load_or_create(&path);
        assert_eq!(fresh.node_count(), 0);
        assert!(fresh.associations.is_empty());

        let missing = Snapshot::load_or_create(&dir.path().join("missing.bin"));
        assert_eq!(missing.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn test_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kavram.json");
        sample().export_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["associations"][0]["query_token"], "elma");
        assert_eq!(value["examples"][0]["normalized_query"], "elma nedir");
    }
}
