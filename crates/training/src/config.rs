//! Pipeline configuration: defaults, optional TOML overrides, validation.

use crate::classifier::TrainParams;
use genome_dataset::DEFAULT_EVALUATION_STUDY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "ancestry.toml";
pub const CONFIG_ENV: &str = "ANCESTRY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub images_path: PathBuf,
    pub meta_path: PathBuf,
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
    pub seed: Option<u64>,
    /// Study label that selects the evaluation cohort.
    pub evaluation_study: String,
    /// Directory receiving previews, plots, tables and the checkpoint.
    pub output_dir: PathBuf,
    /// File stem of the checkpoint and its manifest.
    pub model_name: String,
}

impl PipelineConfig {
    pub fn new(images_path: impl Into<PathBuf>, meta_path: impl Into<PathBuf>) -> Self {
        Self {
            images_path: images_path.into(),
            meta_path: meta_path.into(),
            epochs: 5,
            batch_size: 128,
            validation_split: 0.1,
            learning_rate: 1e-3,
            seed: None,
            evaluation_study: DEFAULT_EVALUATION_STUDY.to_string(),
            output_dir: PathBuf::from("."),
            model_name: "ancestry".to_string(),
        }
    }

    /// Defaults overlaid with the TOML file named by `ANCESTRY_CONFIG`, else `ancestry.toml`.
    ///
    /// A missing file means defaults; an unreadable or invalid one is an error.
    pub fn load(
        images_path: impl Into<PathBuf>,
        meta_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let base = Self::new(images_path, meta_path);
        let path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME));
        let cfg = base.with_file(&path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from `path` when it exists.
    pub fn with_file(self, path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(self);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SettingsFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.with_settings(file))
    }

    fn with_settings(mut self, file: SettingsFile) -> Self {
        if let Some(training) = file.training {
            self.epochs = training.epochs.unwrap_or(self.epochs);
            self.batch_size = training.batch_size.unwrap_or(self.batch_size);
            self.validation_split = training.validation_split.unwrap_or(self.validation_split);
            self.learning_rate = training.learning_rate.unwrap_or(self.learning_rate);
            self.seed = training.seed.or(self.seed);
        }
        if let Some(cohorts) = file.cohorts {
            if let Some(study) = cohorts.evaluation_study {
                self.evaluation_study = study;
            }
        }
        if let Some(output) = file.output {
            if let Some(dir) = output.dir {
                self.output_dir = PathBuf::from(dir);
            }
            if let Some(name) = output.model_name {
                self.model_name = name;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::Invalid("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ConfigError::Invalid(format!(
                "validation_split {} outside [0, 1)",
                self.validation_split
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::Invalid("learning_rate must be positive".into()));
        }
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::Invalid("model_name is empty".into()));
        }
        Ok(())
    }

    pub fn train_params(&self, classes: usize) -> TrainParams {
        TrainParams {
            classes,
            epochs: self.epochs,
            batch_size: self.batch_size,
            validation_split: self.validation_split,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    training: Option<TrainingSection>,
    cohorts: Option<CohortSection>,
    output: Option<OutputSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrainingSection {
    epochs: Option<usize>,
    batch_size: Option<usize>,
    validation_split: Option<f64>,
    learning_rate: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CohortSection {
    evaluation_study: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    dir: Option<String>,
    model_name: Option<String>,
}
