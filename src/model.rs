use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::columns::FEATURE_NAMES;
use crate::error::WarDataError;
use crate::forest::RandomForestRegressor;
use crate::ingest::WarEvent;
use crate::store::WarStore;

pub const MODEL_FORMAT_VERSION: u32 = 1;

/// What a model was trained on; written next to the forest in the same file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    pub trained_at: String,
    pub feature_names: Vec<String>,
    pub wars: Vec<String>,
    pub samples: usize,
    pub recent_samples: usize,
    pub older_samples: usize,
    pub data_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub manifest: ModelManifest,
    pub forest: RandomForestRegressor,
}

impl ModelArtifact {
    /// Reads the persisted model and rejects files this build cannot score with.
    pub fn load(store: &WarStore) -> Result<Self> {
        let artifact = store.read_model::<ModelArtifact>()?;
        artifact.check_compatible()?;
        Ok(artifact)
    }

    pub fn check_compatible(&self) -> Result<()> {
        if self.manifest.version != MODEL_FORMAT_VERSION {
            return Err(WarDataError::IncompatibleModel {
                reason: format!(
                    "format version {} (expected {MODEL_FORMAT_VERSION}); retrain the model",
                    self.manifest.version
                ),
            }
            .into());
        }
        let expected = FEATURE_NAMES.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        if self.manifest.feature_names != expected || self.forest.n_features() != expected.len() {
            return Err(WarDataError::IncompatibleModel {
                reason: format!(
                    "trained on features {:?}, expected {:?}",
                    self.manifest.feature_names, expected
                ),
            }
            .into());
        }
        self.forest
            .check_structure()
            .map_err(|reason| WarDataError::IncompatibleModel { reason })?;
        Ok(())
    }

    pub fn is_stale_for(&self, events: &[WarEvent]) -> bool {
        self.manifest.data_fingerprint != data_fingerprint(events)
    }
}

/// SHA-256 over war file names and every ingested row, in load order.
pub fn data_fingerprint(events: &[WarEvent]) -> String {
    let mut hasher = Sha256::new();
    for event in events {
        hasher.update(event.label().as_bytes());
        hasher.update([0u8]);
        for row in &event.rows {
            hasher.update(row.tag.as_bytes());
            hasher.update([0u8]);
            for value in row.features() {
                hasher.update(value.to_le_bytes());
            }
            match row.true_stars {
                Some(stars) => {
                    hasher.update([1u8]);
                    hasher.update(stars.to_le_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}
