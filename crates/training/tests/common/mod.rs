#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use genome_dataset::ImageBatch;
use std::io::Write;
use std::path::{Path, PathBuf};
use training::{ClassifierAdapter, EpochMetrics, History, Score, TrainParams, TrainingError};

pub fn write_gz(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(body.as_bytes()).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

pub fn write_plain(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Four 2x2 images: two bright-left "AFR", two bright-right "EUR"; one of each per study.
pub fn four_sample_fixture(dir: &Path) -> (PathBuf, PathBuf) {
    let images = write_gz(
        dir,
        "images.tsv.gz",
        "HG01\t1\t0\t1\t0\n\
         HG02\t0\t1\t0\t1\n\
         DO01\t0.9\t0.1\t0.8\t0\n\
         DO02\t0\t0.9\t0.1\t1\n",
    );
    let meta = write_plain(
        dir,
        "meta.info",
        "HG01\tAFR\tgermline\tfemale\t1kgp\n\
         HG02\tEUR\tgermline\tmale\t1kgp\n\
         DO01\tAFR\ttumor\tmale\tPCAWG\n\
         DO02\tEUR\ttumor\tfemale\tPCAWG\n",
    );
    (images, meta)
}

/// Nearest-centroid classifier: deterministic stand-in for the learning backend.
pub struct CentroidClassifier;

pub struct Centroids {
    pub means: Vec<Vec<f32>>,
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl ClassifierAdapter for CentroidClassifier {
    type Model = Centroids;

    fn train(
        &self,
        train_images: &ImageBatch,
        train_labels: &[usize],
        _eval_images: &ImageBatch,
        _eval_labels: &[usize],
        params: &TrainParams,
    ) -> Result<(Self::Model, History), TrainingError> {
        if train_images.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }
        let n = train_images.pixels_per_image();
        let mut sums = vec![vec![0.0f32; n]; params.classes];
        let mut counts = vec![0usize; params.classes];
        for (i, &label) in train_labels.iter().enumerate() {
            for (s, v) in sums[label].iter_mut().zip(train_images.image(i).unwrap()) {
                *s += v;
            }
            counts[label] += 1;
        }
        let means = sums
            .into_iter()
            .zip(counts)
            .map(|(s, c)| s.into_iter().map(|v| v / c.max(1) as f32).collect())
            .collect();
        let epochs = (0..params.epochs)
            .map(|epoch| EpochMetrics {
                epoch,
                loss: 1.0 / (epoch + 1) as f32,
                accuracy: 0.5,
                val_loss: None,
                val_accuracy: None,
            })
            .collect();
        let history = History {
            epochs,
            test: Some(Score {
                loss: 0.1,
                accuracy: 1.0,
            }),
        };
        Ok((Centroids { means }, history))
    }

    fn predict(
        &self,
        model: &Self::Model,
        images: &ImageBatch,
    ) -> Result<Vec<Vec<f32>>, TrainingError> {
        Ok((0..images.len())
            .map(|i| {
                let img = images.image(i).unwrap();
                let weights: Vec<f32> = model
                    .means
                    .iter()
                    .map(|m| (-distance(img, m)).exp())
                    .collect();
                let total: f32 = weights.iter().sum();
                weights.into_iter().map(|w| w / total).collect()
            })
            .collect())
    }

    fn save(&self, model: &Self::Model, path: &Path) -> Result<PathBuf, TrainingError> {
        let path = path.with_extension("stub");
        std::fs::write(&path, format!("{:?}", model.means)).map_err(|e| {
            TrainingError::Checkpoint {
                path: path.clone(),
                msg: e.to_string(),
            }
        })?;
        Ok(path)
    }
}
