use flate2::write::GzEncoder;
use flate2::Compression;
use genome_dataset::{load_joined, load_metadata, load_pixel_rows, LoadError};
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_gz(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(body.as_bytes()).expect("gzip write");
    std::fs::write(&path, encoder.finish().expect("gzip finish")).expect("write gz");
    path
}

fn write_plain(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write meta");
    path
}

const META: &str = "s1\tEUR\tgermline\tfemale\t1kgp\n\
                    s2\tAFR\tgermline\tmale\t1kgp\n\
                    s3\tEUR\ttumor\tmale\tPCAWG\n";

#[test]
fn joins_on_sample_and_keeps_three_columns() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(
        dir.path(),
        "images.tsv.gz",
        "s2\t0\t0.5\t1\t0.25\ns1\t1\t1\t0\t0\ns3\t0\t0\t0\t0\n",
    );
    let meta = write_plain(dir.path(), "meta.info", META);

    let table = load_joined(&images, &meta).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.pixel_count(), 4);
    let first = &table.records()[0];
    assert_eq!(first.sample, "s2");
    assert_eq!(first.population, "AFR");
    assert_eq!(first.study, "1kgp");
    assert_eq!(first.pixels, vec![0.0, 0.5, 1.0, 0.25]);
    assert_eq!(table.pixel_range(), Some((0.0, 1.0)));
}

#[test]
fn unmatched_rows_are_dropped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(
        dir.path(),
        "images.tsv.gz",
        "s1\t0\t0\t0\t0\nextra\t1\t1\t1\t1\n",
    );
    let meta = write_plain(dir.path(), "meta.info", META);
    let table = load_joined(&images, &meta).unwrap();
    let ids: Vec<&str> = table.records().iter().map(|r| r.sample.as_str()).collect();
    assert_eq!(ids, vec!["s1"]);
}

#[test]
fn empty_join_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(dir.path(), "images.tsv.gz", "x1\t0\t0\t0\t0\n");
    let meta = write_plain(dir.path(), "meta.info", META);
    let err = load_joined(&images, &meta).unwrap_err();
    assert!(matches!(err, LoadError::EmptyJoin { .. }), "got {err:?}");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let meta = write_plain(dir.path(), "meta.info", META);
    let err = load_joined(&dir.path().join("absent.tsv.gz"), &meta).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }), "got {err:?}");
}

#[test]
fn metadata_needs_exactly_five_columns() {
    let dir = tempfile::tempdir().unwrap();
    let meta = write_plain(dir.path(), "meta.info", "s1\tEUR\tgermline\tfemale\n");
    let err = load_metadata(&meta).unwrap_err();
    match err {
        LoadError::ColumnCount { found, .. } => assert_eq!(found, 4),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn ragged_image_rows_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(dir.path(), "images.tsv.gz", "s1\t0\t0\t0\t0\ns2\t0\t0\n");
    let err = load_pixel_rows(&images).unwrap_err();
    assert!(matches!(err, LoadError::ColumnCount { .. }), "got {err:?}");
}

#[test]
fn non_numeric_pixel_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_gz(dir.path(), "images.tsv.gz", "s1\t0\tabc\t0\t0\n");
    let err = load_pixel_rows(&images).unwrap_err();
    match err {
        LoadError::NotNumeric { column, value, .. } => {
            assert_eq!(column, 2);
            assert_eq!(value, "abc");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn duplicate_sample_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let meta = write_plain(
        dir.path(),
        "meta.info",
        "s1\tEUR\tgermline\tfemale\t1kgp\ns1\tAFR\tgermline\tmale\t1kgp\n",
    );
    let err = load_metadata(&meta).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateSample { .. }), "got {err:?}");
}

#[test]
fn uncompressed_image_table_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_plain(dir.path(), "images.tsv.gz", "s1\t0\t0\t0\t0\n");
    assert!(load_pixel_rows(&images).is_err());
}
