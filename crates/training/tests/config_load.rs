use std::path::PathBuf;
use training::{ConfigError, PipelineConfig};

#[test]
fn defaults_match_reference_run() {
    let cfg = PipelineConfig::new("images.tsv.gz", "meta.info");
    assert_eq!(cfg.epochs, 5);
    assert_eq!(cfg.batch_size, 128);
    assert_eq!(cfg.validation_split, 0.1);
    assert_eq!(cfg.evaluation_study, "PCAWG");
    assert_eq!(cfg.output_dir, PathBuf::from("."));
    assert!(cfg.validate().is_ok());
    let params = cfg.train_params(26);
    assert_eq!(params.classes, 26);
    assert_eq!(params.batch_size, 128);
}

#[test]
fn file_overrides_only_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ancestry.toml");
    std::fs::write(
        &path,
        r#"
[training]
epochs = 12
seed = 42

[cohorts]
evaluation_study = "TCGA"

[output]
dir = "runs/latest"
"#,
    )
    .unwrap();
    let cfg = PipelineConfig::new("i.tsv.gz", "m.info")
        .with_file(&path)
        .unwrap();
    assert_eq!(cfg.epochs, 12);
    assert_eq!(cfg.seed, Some(42));
    assert_eq!(cfg.batch_size, 128);
    assert_eq!(cfg.evaluation_study, "TCGA");
    assert_eq!(cfg.output_dir, PathBuf::from("runs/latest"));
    assert_eq!(cfg.model_name, "ancestry");
}

#[test]
fn missing_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let base = PipelineConfig::new("i.tsv.gz", "m.info");
    let cfg = base.clone().with_file(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, base);
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ancestry.toml");
    std::fs::write(&path, "[training]\nepoch = 3\n").unwrap();
    let err = PipelineConfig::new("i", "m").with_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
}

#[test]
fn validation_split_must_leave_training_data() {
    let mut cfg = PipelineConfig::new("i", "m");
    cfg.validation_split = 1.0;
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    cfg.validation_split = 0.0;
    cfg.epochs = 0;
    assert!(cfg.validate().is_err());
}
