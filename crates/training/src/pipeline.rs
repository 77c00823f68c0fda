//! End-to-end run: load, split, tensorize, train, report.

use crate::checkpoint::{manifest_path, CheckpointManifest};
use crate::classifier::{ClassifierAdapter, History, TrainingError};
use crate::config::{ConfigError, PipelineConfig};
use crate::report::{summarize, ReportArtifacts, ReportError};
use genome_dataset::{
    load_joined, write_preview, CategoryTable, CohortSplitter, ImageTensorBuilder, LoadError,
    ShapeError, UnknownCategoryError,
};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Category(#[from] UnknownCategoryError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub training_samples: usize,
    pub evaluation_samples: usize,
    pub image_side: usize,
    pub categories: CategoryTable,
    pub history: History,
    pub previews: Vec<PathBuf>,
    pub model: PathBuf,
    pub manifest: PathBuf,
    pub report: ReportArtifacts,
}

/// Run the whole pipeline with `classifier` as the learning backend.
///
/// Artifacts are written into `cfg.output_dir` as each stage completes; a failure
/// leaves whatever was written before it.
pub fn run_pipeline<C: ClassifierAdapter>(
    cfg: &PipelineConfig,
    classifier: &C,
) -> Result<PipelineOutcome, PipelineError> {
    cfg.validate()?;
    fs::create_dir_all(&cfg.output_dir).map_err(|source| PipelineError::OutputDir {
        path: cfg.output_dir.clone(),
        source,
    })?;

    let table = load_joined(&cfg.images_path, &cfg.meta_path)?;
    // Fit on the full table so both cohorts share one code space.
    let categories = CategoryTable::fit(table.populations());
    info!(
        classes = categories.len(),
        categories = ?categories.categories(),
        "fitted population categories"
    );
    let builder = ImageTensorBuilder::new(table.pixel_count())?;

    let (training, evaluation) = CohortSplitter::new(cfg.evaluation_study.as_str()).split(table);
    let train_images = builder.build(training.records())?;
    let eval_images = builder.build(evaluation.records())?;
    let train_labels = categories.encode_all(training.populations())?;
    let eval_labels = categories.encode_all(evaluation.populations())?;
    info!(
        train_shape = ?train_images.shape(),
        eval_shape = ?eval_images.shape(),
        "built image tensors"
    );

    let previews: Vec<PathBuf> = [&train_images, &eval_images]
        .into_iter()
        .filter(|batch| !batch.is_empty())
        .filter_map(|batch| write_preview(batch, 0, &cfg.output_dir))
        .collect();

    let params = cfg.train_params(categories.len());
    let (model, history) = classifier.train(
        &train_images,
        &train_labels,
        &eval_images,
        &eval_labels,
        &params,
    )?;

    let stem = cfg.output_dir.join(&cfg.model_name);
    let model_path = classifier.save(&model, &stem)?;
    let manifest_file = manifest_path(&stem);
    let manifest = CheckpointManifest {
        side: builder.side(),
        categories: categories.clone(),
        evaluation_study: cfg.evaluation_study.clone(),
        weights: model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    manifest.save(&manifest_file)?;

    let probabilities = classifier.predict(&model, &eval_images)?;
    let report = summarize(
        &history,
        &eval_labels,
        &probabilities,
        &categories,
        eval_images.sample_ids(),
        &cfg.output_dir,
    )?;

    Ok(PipelineOutcome {
        training_samples: training.len(),
        evaluation_samples: evaluation.len(),
        image_side: builder.side(),
        categories,
        history,
        previews,
        model: model_path,
        manifest: manifest_file,
        report,
    })
}
