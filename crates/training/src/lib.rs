#![recursion_limit = "256"]

pub mod burn_classifier;
pub mod checkpoint;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod telemetry;

pub use burn_classifier::BurnClassifier;
pub use checkpoint::{load_classifier_from_checkpoint, manifest_path, CheckpointManifest};
pub use classifier::{ClassifierAdapter, EpochMetrics, History, Score, TrainParams, TrainingError};
pub use cli::{run_encode, run_predict, run_train, EncodeArgs, PredictArgs, TrainArgs};
pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{run_pipeline, PipelineError, PipelineOutcome};
pub use report::{ConfusionMatrix, PredictionRecord, ReportArtifacts, ReportError};

/// Backend alias for training and inference.
pub type TrainBackend = burn_ndarray::NdArray<f32>;
