//! Evaluation artifacts: prediction table, confusion matrix and training curves.

use crate::burn_classifier::argmax;
use crate::classifier::History;
use crate::plot::{render_confusion, render_history};
use genome_dataset::{CategoryTable, UnknownCategoryError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const OUTCOME_FILE: &str = "outcome.tsv";
pub const ACC_LOSS_FILE: &str = "acc_loss.png";
pub const HISTORY_FILE: &str = "history.tsv";
pub const CONFUSION_PNG_FILE: &str = "confusion_matrix.png";
pub const CONFUSION_TSV_FILE: &str = "confusion_matrix.tsv";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Category(#[from] UnknownCategoryError),
    #[error("{ids} sample ids, {labels} labels and {probabilities} probability vectors")]
    LengthMismatch {
        ids: usize,
        labels: usize,
        probabilities: usize,
    },
    #[error("sample {sample} has {found} class probabilities, expected {expected}")]
    ProbabilityWidth {
        sample: String,
        expected: usize,
        found: usize,
    },
}

/// One evaluated sample; field order is the column order of `outcome.tsv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub sample: String,
    pub population: String,
    pub prediction: String,
    /// Largest class probability.
    pub probability: f32,
}

/// Counts of `(true, predicted)` class pairs; rows are true classes, columns predicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn from_codes(
        categories: &CategoryTable,
        truth: &[usize],
        predicted: &[usize],
    ) -> Result<Self, UnknownCategoryError> {
        let n = categories.len();
        let mut counts = vec![vec![0u64; n]; n];
        for (&t, &p) in truth.iter().zip(predicted) {
            categories.decode(t)?;
            categories.decode(p)?;
            counts[t][p] += 1;
        }
        Ok(Self {
            labels: categories.categories().to_vec(),
            counts,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn classes(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u64 {
        self.counts
            .get(truth)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.counts
    }

    /// Samples per true class.
    pub fn row_sums(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn total(&self) -> u64 {
        self.row_sums().iter().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..self.classes()).map(|i| self.counts[i][i]).sum()
    }

    pub fn max_count(&self) -> u64 {
        self.counts
            .iter()
            .flat_map(|row| row.iter().copied())
            .max()
            .unwrap_or(0)
    }
}

/// Decode argmax predictions; returns the records and the predicted class codes.
pub fn build_predictions(
    sample_ids: &[String],
    truth: &[usize],
    probabilities: &[Vec<f32>],
    categories: &CategoryTable,
) -> Result<(Vec<PredictionRecord>, Vec<usize>), ReportError> {
    if sample_ids.len() != truth.len() || truth.len() != probabilities.len() {
        return Err(ReportError::LengthMismatch {
            ids: sample_ids.len(),
            labels: truth.len(),
            probabilities: probabilities.len(),
        });
    }
    let mut records = Vec::with_capacity(sample_ids.len());
    let mut codes = Vec::with_capacity(sample_ids.len());
    for ((sample, &t), probs) in sample_ids.iter().zip(truth).zip(probabilities) {
        if probs.len() != categories.len() {
            return Err(ReportError::ProbabilityWidth {
                sample: sample.clone(),
                expected: categories.len(),
                found: probs.len(),
            });
        }
        let predicted = argmax(probs).ok_or(ReportError::ProbabilityWidth {
            sample: sample.clone(),
            expected: categories.len(),
            found: 0,
        })?;
        records.push(PredictionRecord {
            sample: sample.clone(),
            population: categories.decode(t)?.to_string(),
            prediction: categories.decode(predicted)?.to_string(),
            probability: probs[predicted].clamp(0.0, 1.0),
        });
        codes.push(predicted);
    }
    Ok((records, codes))
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, ReportError> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|source| ReportError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> ReportError + '_ {
    move |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn flush(mut writer: csv::Writer<std::fs::File>, path: &Path) -> Result<(), ReportError> {
    writer.flush().map_err(|e| ReportError::Csv {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Write `sample, population, prediction, probability` rows in the given order.
pub fn write_outcome(path: &Path, records: &[PredictionRecord]) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    if records.is_empty() {
        writer
            .write_record(["sample", "population", "prediction", "probability"])
            .map_err(csv_err(path))?;
    }
    for record in records {
        writer.serialize(record).map_err(csv_err(path))?;
    }
    flush(writer, path)
}

/// `outcome.tsv` columns followed by one probability column per class, in category order.
pub fn write_outcome_with_probabilities(
    path: &Path,
    records: &[PredictionRecord],
    probabilities: &[Vec<f32>],
    categories: &CategoryTable,
) -> Result<(), ReportError> {
    if records.len() != probabilities.len() {
        return Err(ReportError::LengthMismatch {
            ids: records.len(),
            labels: records.len(),
            probabilities: probabilities.len(),
        });
    }
    let mut writer = tsv_writer(path)?;
    let mut header: Vec<String> = ["sample", "population", "prediction", "probability"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    header.extend(categories.categories().iter().cloned());
    writer.write_record(&header).map_err(csv_err(path))?;

    for (record, probs) in records.iter().zip(probabilities) {
        if probs.len() != categories.len() {
            return Err(ReportError::ProbabilityWidth {
                sample: record.sample.clone(),
                expected: categories.len(),
                found: probs.len(),
            });
        }
        let mut fields = vec![
            record.sample.clone(),
            record.population.clone(),
            record.prediction.clone(),
            record.probability.to_string(),
        ];
        fields.extend(probs.iter().map(|p| p.clamp(0.0, 1.0).to_string()));
        writer.write_record(&fields).map_err(csv_err(path))?;
    }
    flush(writer, path)
}

pub fn write_history(path: &Path, history: &History) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    if history.epochs.is_empty() {
        writer
            .write_record(["epoch", "loss", "accuracy", "val_loss", "val_accuracy"])
            .map_err(csv_err(path))?;
    }
    for epoch in &history.epochs {
        writer.serialize(epoch).map_err(csv_err(path))?;
    }
    flush(writer, path)
}

pub fn write_confusion(path: &Path, matrix: &ConfusionMatrix) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    let mut header = vec!["true\\predicted".to_string()];
    header.extend(matrix.labels().iter().cloned());
    writer.write_record(&header).map_err(csv_err(path))?;
    for (label, row) in matrix.labels().iter().zip(matrix.rows()) {
        let mut fields = vec![label.clone()];
        fields.extend(row.iter().map(u64::to_string));
        writer.write_record(&fields).map_err(csv_err(path))?;
    }
    flush(writer, path)
}

fn save_png(img: &image::RgbImage, path: &Path) -> Result<(), ReportError> {
    img.save(path).map_err(|source| ReportError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Everything written by [`summarize`].
#[derive(Debug, Clone)]
pub struct ReportArtifacts {
    pub predictions: Vec<PredictionRecord>,
    pub confusion: ConfusionMatrix,
    pub outcome: PathBuf,
    pub acc_loss: PathBuf,
    pub history: PathBuf,
    pub confusion_png: PathBuf,
    pub confusion_tsv: PathBuf,
}

/// Write training curves, the confusion matrix and the prediction table into `out_dir`.
pub fn summarize(
    history: &History,
    truth: &[usize],
    probabilities: &[Vec<f32>],
    categories: &CategoryTable,
    sample_ids: &[String],
    out_dir: &Path,
) -> Result<ReportArtifacts, ReportError> {
    let history_path = out_dir.join(HISTORY_FILE);
    write_history(&history_path, history)?;
    let acc_loss = out_dir.join(ACC_LOSS_FILE);
    save_png(&render_history(history), &acc_loss)?;

    let (predictions, predicted) = build_predictions(sample_ids, truth, probabilities, categories)?;
    let confusion = ConfusionMatrix::from_codes(categories, truth, &predicted)?;
    let confusion_tsv = out_dir.join(CONFUSION_TSV_FILE);
    write_confusion(&confusion_tsv, &confusion)?;
    let confusion_png = out_dir.join(CONFUSION_PNG_FILE);
    save_png(&render_confusion(&confusion), &confusion_png)?;

    let outcome = out_dir.join(OUTCOME_FILE);
    write_outcome(&outcome, &predictions)?;
    info!(
        samples = predictions.len(),
        correct = confusion.correct(),
        path = %outcome.display(),
        "wrote prediction table"
    );

    Ok(ReportArtifacts {
        predictions,
        confusion,
        outcome,
        acc_loss,
        history: history_path,
        confusion_png,
        confusion_tsv,
    })
}
