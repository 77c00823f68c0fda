mod common;

use common::{four_sample_fixture, write_gz, write_plain, CentroidClassifier};
use genome_dataset::{LoadError, ShapeError};
use training::{run_pipeline, CheckpointManifest, PipelineConfig, PipelineError};

fn config(dir: &std::path::Path, images: std::path::PathBuf, meta: std::path::PathBuf) -> PipelineConfig {
    let mut cfg = PipelineConfig::new(images, meta);
    cfg.output_dir = dir.join("out");
    cfg.epochs = 3;
    cfg.seed = Some(1);
    cfg
}

#[test]
fn four_sample_run_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (images, meta) = four_sample_fixture(dir.path());
    let cfg = config(dir.path(), images, meta);

    let outcome = run_pipeline(&cfg, &CentroidClassifier).unwrap();
    assert_eq!(outcome.training_samples, 2);
    assert_eq!(outcome.evaluation_samples, 2);
    assert_eq!(outcome.image_side, 2);
    assert_eq!(outcome.categories.categories(), &["AFR", "EUR"]);
    assert_eq!(outcome.history.epochs.len(), 3);

    let confusion = &outcome.report.confusion;
    assert_eq!(confusion.classes(), 2);
    assert_eq!(confusion.rows().len(), 2);
    assert!(confusion.rows().iter().all(|row| row.len() == 2));
    assert_eq!(confusion.row_sums(), vec![1, 1]);
    assert_eq!(confusion.correct(), 2);

    let outcome_tsv = std::fs::read_to_string(&outcome.report.outcome).unwrap();
    let lines: Vec<&str> = outcome_tsv.lines().collect();
    assert_eq!(lines[0], "sample\tpopulation\tprediction\tprobability");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("DO01\tAFR\tAFR\t"));
    assert!(lines[2].starts_with("DO02\tEUR\tEUR\t"));

    for record in &outcome.report.predictions {
        assert!((0.0..=1.0).contains(&record.probability));
        assert!(outcome.categories.contains(&record.prediction));
    }

    let out = cfg.output_dir.as_path();
    for name in [
        "HG01.png",
        "DO01.png",
        "acc_loss.png",
        "confusion_matrix.png",
        "confusion_matrix.tsv",
        "history.tsv",
        "outcome.tsv",
        "ancestry.stub",
        "ancestry.json",
    ] {
        assert!(out.join(name).exists(), "missing {name}");
    }
    let manifest = CheckpointManifest::load(&outcome.manifest).unwrap();
    assert_eq!(manifest.side, 2);
    assert_eq!(manifest.weights, "ancestry.stub");
    assert_eq!(manifest.categories, outcome.categories);
}

#[test]
fn non_square_pixel_count_aborts_with_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(dir.path(), "images.tsv.gz", "a\t0\t1\t0\nb\t1\t0\t1\n");
    let meta = write_plain(
        dir.path(),
        "meta.info",
        "a\tAFR\tgermline\tfemale\t1kgp\nb\tEUR\ttumor\tmale\tPCAWG\n",
    );
    let err = run_pipeline(&config(dir.path(), images, meta), &CentroidClassifier).unwrap_err();
    assert!(
        matches!(err, PipelineError::Shape(ShapeError::NotSquare { pixels: 3 })),
        "got {err:?}"
    );
}

#[test]
fn empty_join_aborts_with_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(dir.path(), "images.tsv.gz", "a\t0\t1\t0\t1\n");
    let meta = write_plain(dir.path(), "meta.info", "z\tAFR\tgermline\tfemale\t1kgp\n");
    let err = run_pipeline(&config(dir.path(), images, meta), &CentroidClassifier).unwrap_err();
    assert!(
        matches!(err, PipelineError::Load(LoadError::EmptyJoin { .. })),
        "got {err:?}"
    );
}

#[test]
fn invalid_config_is_rejected_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(
        dir.path(),
        dir.path().join("missing.tsv.gz"),
        dir.path().join("missing.info"),
    );
    cfg.batch_size = 0;
    let err = run_pipeline(&cfg, &CentroidClassifier).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)), "got {err:?}");
}
