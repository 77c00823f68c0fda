//! Command-line entry points for the `train`, `predict` and `encode` binaries.

use crate::burn_classifier::BurnClassifier;
use crate::checkpoint::{load_classifier_from_checkpoint, manifest_path};
use crate::classifier::ClassifierAdapter;
use crate::config::PipelineConfig;
use crate::pipeline::run_pipeline;
use crate::report::{build_predictions, write_outcome_with_probabilities, OUTCOME_FILE};
use clap::Parser;
use genome_dataset::hilbert::{read_genotypes, sample_name, write_encoded};
use genome_dataset::{load_joined, HilbertEncoder, ImageTensorBuilder};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Train the population classifier on variant images and report on the held-out study"
)]
pub struct TrainArgs {
    /// Images table (gzip, tab-separated, no header; sample id then pixels).
    #[arg(short = 'i', long = "images", value_name = "image.tsv.gz")]
    pub images: PathBuf,
    /// Sample information (tab-separated: sample, population, type, sex, study).
    #[arg(short = 'm', long = "meta", value_name = "meta.info")]
    pub meta: PathBuf,
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let cfg = PipelineConfig::load(args.images, args.meta)?;
    info!(
        epochs = cfg.epochs,
        batch_size = cfg.batch_size,
        validation_split = cfg.validation_split,
        evaluation_study = %cfg.evaluation_study,
        output_dir = %cfg.output_dir.display(),
        "starting ancestry training run"
    );
    let outcome = run_pipeline(&cfg, &BurnClassifier)?;
    if let Some(test) = outcome.history.test {
        info!(loss = test.loss, accuracy = test.accuracy, "evaluation score");
    }
    println!(
        "Trained on {} samples, evaluated {} ({} correct); checkpoint {} and predictions {}",
        outcome.training_samples,
        outcome.evaluation_samples,
        outcome.report.confusion.correct(),
        outcome.model.display(),
        outcome.report.outcome.display()
    );
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "predict",
    about = "Predict populations for variant images with a saved checkpoint"
)]
pub struct PredictArgs {
    /// Images table (gzip, tab-separated, no header; sample id then pixels).
    #[arg(short = 'i', long = "images", value_name = "image.tsv.gz")]
    pub images: PathBuf,
    /// Sample information (tab-separated: sample, population, type, sex, study).
    #[arg(short = 'm', long = "meta", value_name = "meta.info")]
    pub meta: PathBuf,
    /// Checkpoint stem written by `train` (`<stem>.json` manifest, `<stem>.bin` weights).
    #[arg(short = 'c', long = "checkpoint", value_name = "stem", default_value = "ancestry")]
    pub checkpoint: PathBuf,
    /// Output prediction table, with one probability column per population.
    #[arg(short = 'o', long = "output", default_value = OUTCOME_FILE)]
    pub output: PathBuf,
}

pub fn run_predict(args: PredictArgs) -> anyhow::Result<()> {
    let manifest_file = manifest_path(&args.checkpoint);
    let (model, manifest) = load_classifier_from_checkpoint(&manifest_file)?;
    let categories = &manifest.categories;
    let table = load_joined(&args.images, &args.meta)?;
    let builder = ImageTensorBuilder::new(table.pixel_count())?;
    if builder.side() != manifest.side {
        anyhow::bail!(
            "checkpoint {} expects {}x{} images but {} has {} pixels per row",
            manifest_file.display(),
            manifest.side,
            manifest.side,
            args.images.display(),
            table.pixel_count()
        );
    }

    let (known, unknown): (Vec<_>, Vec<_>) = table
        .into_records()
        .into_iter()
        .partition(|r| categories.contains(&r.population));
    for record in &unknown {
        warn!(
            sample = %record.sample,
            population = %record.population,
            "population not in checkpoint categories; skipped"
        );
    }

    let images = builder.build(&known)?;
    let truth = categories.encode_all(known.iter().map(|r| r.population.as_str()))?;
    let probabilities = BurnClassifier.predict(&model, &images)?;
    let (records, _) = build_predictions(images.sample_ids(), &truth, &probabilities, categories)?;
    write_outcome_with_probabilities(&args.output, &records, &probabilities, categories)?;
    println!(
        "Predicted {} samples ({} skipped); wrote {}",
        records.len(),
        unknown.len(),
        args.output.display()
    );
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "encode",
    about = "Encode per-sample genotype columns into Hilbert-curve image rows"
)]
pub struct EncodeArgs {
    /// Genotype files, one 0/1/2 value per line (`.gz` is decompressed).
    #[arg(required = true, value_name = "files")]
    pub files: Vec<PathBuf>,
    /// Order of the Hilbert curve; images are 2^order pixels wide.
    #[arg(short = 'o', long = "order")]
    pub order: Option<u32>,
    /// Write only the pixel rows, no PNG images.
    #[arg(long = "no-image")]
    pub no_image: bool,
    /// Directory for the `.tsv` rows and `.png` images.
    #[arg(short = 'd', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,
}

pub fn run_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let encoder = match args.order {
        Some(order) => HilbertEncoder::with_order(order)?,
        None => HilbertEncoder::new(),
    };
    std::fs::create_dir_all(&args.out_dir)?;
    for file in &args.files {
        let Some(sample) = sample_name(file) else {
            return Err(genome_dataset::EncodeError::SampleName { path: file.clone() }.into());
        };
        let genotypes = read_genotypes(file)?;
        let encoded = encoder.encode(&genotypes);
        let written = write_encoded(&sample, &encoded, &args.out_dir, !args.no_image)?;
        match written.image {
            Some(image) => println!("[done] {} {}", written.table.display(), image.display()),
            None => println!("[done] {}", written.table.display()),
        }
    }
    Ok(())
}
