//! Checkpoint manifest stored beside the Burn weights, and reloading for inference.

use crate::classifier::TrainingError;
use crate::TrainBackend;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use genome_dataset::CategoryTable;
use models::{AncestryNet, AncestryNetConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything needed to rebuild the network and decode its outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    /// Image side length the network was built for.
    pub side: usize,
    pub categories: CategoryTable,
    pub evaluation_study: String,
    /// Weights file name, relative to the manifest's directory.
    pub weights: String,
}

impl CheckpointManifest {
    pub fn model_config(&self) -> AncestryNetConfig {
        AncestryNetConfig::new(self.side, self.categories.len())
    }

    pub fn save(&self, path: &Path) -> Result<(), TrainingError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| TrainingError::Checkpoint {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| TrainingError::Checkpoint {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, TrainingError> {
        let raw = std::fs::read(path).map_err(|e| TrainingError::Checkpoint {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
        serde_json::from_slice(&raw).map_err(|e| TrainingError::Checkpoint {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })
    }

    pub fn weights_path(&self, manifest_path: &Path) -> PathBuf {
        manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.weights)
    }
}

/// Manifest path for a checkpoint stem: `<stem>.json`. A path already ending in
/// `.json` is returned unchanged.
pub fn manifest_path(stem: &Path) -> PathBuf {
    if stem
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        return stem.to_path_buf();
    }
    let mut path = stem.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

/// Load the manifest at `manifest_path` and the weights it names.
pub fn load_classifier_from_checkpoint(
    manifest_path: &Path,
) -> Result<(AncestryNet<TrainBackend>, CheckpointManifest), TrainingError> {
    let manifest = CheckpointManifest::load(manifest_path)?;
    let weights = manifest.weights_path(manifest_path);
    let device = <TrainBackend as Backend>::Device::default();
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model = AncestryNet::<TrainBackend>::new(manifest.model_config(), &device)
        .load_file(weights.clone(), &recorder, &device)
        .map_err(|e| TrainingError::Checkpoint {
            path: weights,
            msg: format!("failed to load checkpoint: {e}"),
        })?;
    Ok((model, manifest))
}
