mod common;

use common::{write_gz, write_plain};
use genome_dataset::{CategoryTable, ImageTensorBuilder, SampleRecord};
use training::{
    load_classifier_from_checkpoint, run_pipeline, run_predict, BurnClassifier, ClassifierAdapter,
    PipelineConfig, PredictArgs, TrainParams,
};

fn record(sample: &str, population: &str, left: bool) -> SampleRecord {
    let pixels = (0..16)
        .map(|i| if (i % 4 < 2) == left { 1.0 } else { 0.0 })
        .collect();
    SampleRecord {
        sample: sample.into(),
        pixels,
        population: population.into(),
        study: "1kgp".into(),
    }
}

#[test]
fn one_epoch_trains_and_predicts_probabilities() {
    let builder = ImageTensorBuilder::new(16).unwrap();
    let train = builder
        .build(&[
            record("a", "AFR", true),
            record("b", "EUR", false),
            record("c", "AFR", true),
            record("d", "EUR", false),
        ])
        .unwrap();
    let eval = builder
        .build(&[record("e", "AFR", true), record("f", "EUR", false)])
        .unwrap();
    let params = TrainParams {
        classes: 2,
        epochs: 1,
        batch_size: 2,
        validation_split: 0.25,
        learning_rate: 1e-3,
        seed: Some(3),
    };

    let (model, history) = BurnClassifier
        .train(&train, &[0, 1, 0, 1], &eval, &[0, 1], &params)
        .unwrap();
    assert_eq!(history.epochs.len(), 1);
    assert!(history.epochs[0].loss.is_finite());
    assert!(history.epochs[0].val_loss.is_some());
    let test = history.test.unwrap();
    assert!((0.0..=1.0).contains(&test.accuracy));

    let probs = BurnClassifier.predict(&model, &eval).unwrap();
    assert_eq!(probs.len(), 2);
    for row in &probs {
        assert_eq!(row.len(), 2);
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn empty_training_cohort_is_a_training_error() {
    let builder = ImageTensorBuilder::new(4).unwrap();
    let empty = builder.build(&[]).unwrap();
    let params = TrainParams {
        classes: 1,
        epochs: 1,
        batch_size: 1,
        validation_split: 0.0,
        learning_rate: 1e-3,
        seed: None,
    };
    let err = BurnClassifier
        .train(&empty, &[], &empty, &[], &params)
        .unwrap_err();
    assert!(matches!(err, training::TrainingError::EmptyTrainingSet));
}

#[test]
fn pipeline_checkpoint_reloads_for_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let row = |id: &str, left: bool| {
        let cells: Vec<&str> = (0..16)
            .map(|i| if (i % 4 < 2) == left { "1" } else { "0" })
            .collect();
        format!("{id}\t{}\n", cells.join("\t"))
    };
    let body: String = [
        row("HG01", true),
        row("HG02", false),
        row("HG03", true),
        row("HG04", false),
        row("DO01", true),
        row("DO02", false),
    ]
    .concat();
    let images = write_gz(dir.path(), "images.tsv.gz", &body);
    let meta = write_plain(
        dir.path(),
        "meta.info",
        "HG01\tAFR\tgermline\tfemale\t1kgp\n\
         HG02\tEUR\tgermline\tmale\t1kgp\n\
         HG03\tAFR\tgermline\tmale\t1kgp\n\
         HG04\tEUR\tgermline\tfemale\t1kgp\n\
         DO01\tAFR\ttumor\tmale\tPCAWG\n\
         DO02\tEUR\ttumor\tfemale\tPCAWG\n",
    );

    let mut cfg = PipelineConfig::new(images.clone(), meta.clone());
    cfg.output_dir = dir.path().join("out");
    cfg.epochs = 1;
    cfg.batch_size = 2;
    cfg.seed = Some(9);
    let outcome = run_pipeline(&cfg, &BurnClassifier).unwrap();
    assert_eq!(outcome.model, cfg.output_dir.join("ancestry.bin"));
    assert_eq!(outcome.report.predictions.len(), 2);

    let (_, manifest) = load_classifier_from_checkpoint(&outcome.manifest).unwrap();
    assert_eq!(manifest.side, 4);
    assert_eq!(manifest.categories, CategoryTable::fit(["EUR", "AFR"]));

    let output = dir.path().join("predicted.tsv");
    run_predict(PredictArgs {
        images,
        meta,
        checkpoint: cfg.output_dir.join("ancestry"),
        output: output.clone(),
    })
    .unwrap();
    let body = std::fs::read_to_string(&output).unwrap();
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("sample\tpopulation\tprediction\tprobability\tAFR\tEUR")
    );
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 6);
    for row in &rows {
        assert_eq!(row.len(), 6);
        let top: f32 = row[3].parse().unwrap();
        let per_class: Vec<f32> = row[4..].iter().map(|v| v.parse().unwrap()).collect();
        assert!((per_class.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!((per_class.iter().cloned().fold(0.0, f32::max) - top).abs() < 1e-6);
    }
}
