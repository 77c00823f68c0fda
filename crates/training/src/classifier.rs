//! Seam between the data pipeline and the learning backend.

use genome_dataset::ImageBatch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training cohort is empty")]
    EmptyTrainingSet,
    #[error("evaluation cohort is empty")]
    EmptyEvaluationSet,
    #[error("{images} images but {labels} labels")]
    LabelMismatch { images: usize, labels: usize },
    #[error("label code {code} is out of range for {classes} classes")]
    LabelOutOfRange { code: usize, classes: usize },
    #[error("invalid training parameters: {0}")]
    InvalidParams(String),
    #[error("tensor conversion failed: {0}")]
    Tensor(String),
    #[error("checkpoint error at {path}: {msg}")]
    Checkpoint { path: PathBuf, msg: String },
}

/// Hyper-parameters handed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainParams {
    pub classes: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// Trailing fraction of the training set held out for per-epoch validation.
    pub validation_split: f64,
    pub learning_rate: f64,
    pub seed: Option<u64>,
}

impl TrainParams {
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.classes == 0 {
            return Err(TrainingError::InvalidParams("no classes".into()));
        }
        if self.epochs == 0 {
            return Err(TrainingError::InvalidParams("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidParams("batch size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(TrainingError::InvalidParams(format!(
                "validation split {} outside [0, 1)",
                self.validation_split
            )));
        }
        Ok(())
    }

    /// Sizes of the fitted and held-out parts of `n` training samples.
    ///
    /// The held-out part is the tail, as with Keras `validation_split`. When the split
    /// would leave nothing to fit, everything is fitted and validation is skipped.
    pub fn split_sizes(&self, n: usize) -> (usize, usize) {
        let fit = (n as f64 * (1.0 - self.validation_split)).floor() as usize;
        if fit == 0 {
            (n, 0)
        } else {
            (fit, n - fit)
        }
    }
}

/// Loss and accuracy over one pass of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub loss: f32,
    pub accuracy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

/// Per-epoch metrics plus the final score on the evaluation cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
    pub test: Option<Score>,
}

impl History {
    /// Named metric series in plotting order; validation series only when recorded.
    pub fn series(&self) -> Vec<(&'static str, Vec<f32>)> {
        let mut out = vec![
            ("loss", self.epochs.iter().map(|e| e.loss).collect()),
            ("accuracy", self.epochs.iter().map(|e| e.accuracy).collect()),
        ];
        let val_loss: Option<Vec<f32>> = self.epochs.iter().map(|e| e.val_loss).collect();
        let val_accuracy: Option<Vec<f32>> = self.epochs.iter().map(|e| e.val_accuracy).collect();
        if let Some(values) = val_loss.filter(|v| !v.is_empty()) {
            out.push(("val_loss", values));
        }
        if let Some(values) = val_accuracy.filter(|v| !v.is_empty()) {
            out.push(("val_accuracy", values));
        }
        out
    }
}

/// Training and inference backend consumed by the pipeline.
///
/// `predict` must return one probability vector per image, summing to 1 and indexed by
/// category code.
pub trait ClassifierAdapter {
    type Model;

    fn train(
        &self,
        train_images: &ImageBatch,
        train_labels: &[usize],
        eval_images: &ImageBatch,
        eval_labels: &[usize],
        params: &TrainParams,
    ) -> Result<(Self::Model, History), TrainingError>;

    fn predict(&self, model: &Self::Model, images: &ImageBatch)
        -> Result<Vec<Vec<f32>>, TrainingError>;

    /// Persist the model; returns the path actually written.
    fn save(&self, model: &Self::Model, path: &Path) -> Result<PathBuf, TrainingError>;
}
