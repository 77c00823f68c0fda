use genome_dataset::tensor::to_gray_image;
use genome_dataset::{write_preview, ImageTensorBuilder, SampleRecord, ShapeError};

fn record(sample: &str, pixels: Vec<f32>) -> SampleRecord {
    SampleRecord {
        sample: sample.into(),
        pixels,
        population: "EUR".into(),
        study: "1kgp".into(),
    }
}

#[test]
fn non_square_pixel_count_is_a_shape_error() {
    assert_eq!(
        ImageTensorBuilder::new(5),
        Err(ShapeError::NotSquare { pixels: 5 })
    );
    assert_eq!(ImageTensorBuilder::new(0), Err(ShapeError::NoPixels));
}

#[test]
fn square_rows_reshape_to_side_side_one() {
    let builder = ImageTensorBuilder::new(9).unwrap();
    let rows = vec![
        record("a", (0..9).map(|v| v as f32 / 10.0).collect()),
        record("b", vec![1.0; 9]),
    ];
    let batch = builder.build(&rows).unwrap();
    assert_eq!(batch.shape(), [2, 3, 3, 1]);
    assert_eq!(batch.image_shape(), [3, 3, 1]);
    assert_eq!(batch.sample_ids(), &["a".to_string(), "b".to_string()]);
    // Row-major: pixel (1, 2) of the first image is flattened index 5.
    assert_eq!(batch.pixel(0, 1, 2), Some(0.5));
    assert_eq!(batch.pixel(1, 2, 2), Some(1.0));
    assert_eq!(batch.pixel(0, 3, 0), None);
}

#[test]
fn row_length_mismatch_is_a_shape_error() {
    let builder = ImageTensorBuilder::new(4).unwrap();
    let err = builder.build(&[record("a", vec![0.0; 3])]).unwrap_err();
    assert!(matches!(err, ShapeError::RowLength { found: 3, .. }));
}

#[test]
fn empty_rows_build_an_empty_batch() {
    let builder = ImageTensorBuilder::new(4).unwrap();
    let batch = builder.build(&[]).unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.shape(), [0, 2, 2, 1]);
}

#[test]
fn preview_scales_to_grayscale_bytes() {
    let builder = ImageTensorBuilder::new(4).unwrap();
    let batch = builder
        .build(&[record("HG00096", vec![0.0, 0.5, 1.0, 2.0])])
        .unwrap();
    let img = to_gray_image(&batch, 0).unwrap();
    assert_eq!(img.as_raw(), &vec![0u8, 128, 255, 255]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_preview(&batch, 0, dir.path()).unwrap();
    assert_eq!(path, dir.path().join("HG00096.png"));
    let decoded = image::open(&path).unwrap().to_luma8();
    assert_eq!(decoded.dimensions(), (2, 2));
}

#[test]
fn preview_refuses_sample_ids_that_leave_the_output_dir() {
    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("out");
    std::fs::create_dir(&out).unwrap();

    let absolute = root.path().join("escaped");
    let ids = [absolute.to_string_lossy().into_owned(), "../climbed".to_string()];
    let rows: Vec<SampleRecord> = ids.iter().map(|id| record(id, vec![0.5; 4])).collect();
    let batch = ImageTensorBuilder::new(4).unwrap().build(&rows).unwrap();

    assert_eq!(write_preview(&batch, 0, &out), None);
    assert_eq!(write_preview(&batch, 1, &out), None);
    assert!(!root.path().join("escaped.png").exists());
    assert!(!root.path().join("climbed.png").exists());
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}
