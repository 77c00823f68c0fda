//! `ClassifierAdapter` backed by Burn: `AncestryNet` trained with Adam on cross-entropy.

use crate::classifier::{ClassifierAdapter, EpochMetrics, History, Score, TrainParams, TrainingError};
use crate::TrainBackend;
use burn::backend::Autodiff;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use genome_dataset::ImageBatch;
use models::{AncestryNet, AncestryNetConfig};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::info;

type ADBackend = Autodiff<TrainBackend>;

/// Batch size used for scoring and prediction passes.
const INFERENCE_BATCH: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct BurnClassifier;

fn images_tensor<B: Backend>(
    batch: &ImageBatch,
    indices: &[usize],
    device: &B::Device,
) -> Tensor<B, 4> {
    let side = batch.side();
    let data = TensorData::new(batch.gather(indices), [indices.len(), 1, side, side]);
    Tensor::<B, 4>::from_data(data, device)
}

fn targets_tensor<B: Backend>(
    labels: &[usize],
    indices: &[usize],
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    let codes: Vec<i64> = indices.iter().map(|&i| labels[i] as i64).collect();
    Tensor::<B, 1, Int>::from_data(TensorData::new(codes, [indices.len()]), device)
}

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, TrainingError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| TrainingError::Tensor(format!("{e:?}")))
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn count_correct(
    logits: Vec<f32>,
    classes: usize,
    labels: &[usize],
    indices: &[usize],
) -> usize {
    logits
        .chunks(classes)
        .zip(indices)
        .filter(|(row, i)| argmax(row) == Some(labels[**i]))
        .count()
}

fn check_labels(
    images: &ImageBatch,
    labels: &[usize],
    classes: usize,
) -> Result<(), TrainingError> {
    if images.len() != labels.len() {
        return Err(TrainingError::LabelMismatch {
            images: images.len(),
            labels: labels.len(),
        });
    }
    if let Some(&code) = labels.iter().find(|&&c| c >= classes) {
        return Err(TrainingError::LabelOutOfRange { code, classes });
    }
    Ok(())
}

/// Mean loss and accuracy of `model` over `indices`, without gradients.
fn score<B: Backend>(
    model: &AncestryNet<B>,
    images: &ImageBatch,
    labels: &[usize],
    indices: &[usize],
    classes: usize,
    device: &B::Device,
) -> Result<Score, TrainingError> {
    let loss_fn = CrossEntropyLossConfig::new().init::<B>(device);
    let mut loss_sum = 0.0f32;
    let mut correct = 0usize;
    for chunk in indices.chunks(INFERENCE_BATCH) {
        let logits = model.forward(images_tensor::<B>(images, chunk, device));
        let loss = loss_fn.forward(logits.clone(), targets_tensor::<B>(labels, chunk, device));
        let loss_val = to_vec(loss)?.first().copied().unwrap_or(0.0);
        loss_sum += loss_val * chunk.len() as f32;
        correct += count_correct(to_vec(logits)?, classes, labels, chunk);
    }
    let n = indices.len().max(1) as f32;
    Ok(Score {
        loss: loss_sum / n,
        accuracy: correct as f32 / n,
    })
}

impl ClassifierAdapter for BurnClassifier {
    type Model = AncestryNet<TrainBackend>;

    fn train(
        &self,
        train_images: &ImageBatch,
        train_labels: &[usize],
        eval_images: &ImageBatch,
        eval_labels: &[usize],
        params: &TrainParams,
    ) -> Result<(Self::Model, History), TrainingError> {
        params.validate()?;
        if train_images.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }
        if eval_images.is_empty() {
            return Err(TrainingError::EmptyEvaluationSet);
        }
        check_labels(train_images, train_labels, params.classes)?;
        check_labels(eval_images, eval_labels, params.classes)?;

        let device = <ADBackend as Backend>::Device::default();
        let cfg = AncestryNetConfig::new(train_images.side(), params.classes);
        info!(
            side = cfg.side,
            classes = cfg.classes,
            blocks = cfg.depth(),
            features = cfg.flat_features(),
            "building AncestryNet"
        );
        let mut model = AncestryNet::<ADBackend>::new(cfg, &device);
        let mut optim = AdamConfig::new().init();
        let loss_fn = CrossEntropyLossConfig::new().init::<ADBackend>(&device);

        let (fit_len, val_len) = params.split_sizes(train_images.len());
        let fit_indices: Vec<usize> = (0..fit_len).collect();
        let val_indices: Vec<usize> = (fit_len..fit_len + val_len).collect();
        info!(
            fit = fit_len,
            validation = val_len,
            epochs = params.epochs,
            batch_size = params.batch_size,
            "starting training"
        );

        let mut rng = match params.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        let mut history = History::default();
        for epoch in 0..params.epochs {
            let mut order = fit_indices.clone();
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0f32;
            let mut correct = 0usize;
            for chunk in order.chunks(params.batch_size) {
                let images = images_tensor::<ADBackend>(train_images, chunk, &device);
                let targets = targets_tensor::<ADBackend>(train_labels, chunk, &device);
                let logits = model.forward(images);
                let loss = loss_fn.forward(logits.clone(), targets);

                let loss_val = to_vec(loss.clone().detach())?
                    .first()
                    .copied()
                    .unwrap_or(0.0);
                loss_sum += loss_val * chunk.len() as f32;
                correct +=
                    count_correct(to_vec(logits.detach())?, params.classes, train_labels, chunk);

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(params.learning_rate, model, grads);
            }

            let n = fit_len as f32;
            let validation = if val_indices.is_empty() {
                None
            } else {
                let inner = model.valid();
                Some(score(
                    &inner,
                    train_images,
                    train_labels,
                    &val_indices,
                    params.classes,
                    &<TrainBackend as Backend>::Device::default(),
                )?)
            };
            let metrics = EpochMetrics {
                epoch,
                loss: loss_sum / n,
                accuracy: correct as f32 / n,
                val_loss: validation.map(|s| s.loss),
                val_accuracy: validation.map(|s| s.accuracy),
            };
            info!(
                epoch,
                loss = metrics.loss,
                accuracy = metrics.accuracy,
                val_loss = ?metrics.val_loss,
                val_accuracy = ?metrics.val_accuracy,
                "epoch complete"
            );
            history.epochs.push(metrics);
        }

        let model = model.valid();
        let eval_indices: Vec<usize> = (0..eval_images.len()).collect();
        let test = score(
            &model,
            eval_images,
            eval_labels,
            &eval_indices,
            params.classes,
            &<TrainBackend as Backend>::Device::default(),
        )?;
        info!(
            loss = test.loss,
            accuracy = test.accuracy,
            samples = eval_images.len(),
            "evaluation cohort score"
        );
        history.test = Some(test);
        Ok((model, history))
    }

    fn predict(
        &self,
        model: &Self::Model,
        images: &ImageBatch,
    ) -> Result<Vec<Vec<f32>>, TrainingError> {
        let device = <TrainBackend as Backend>::Device::default();
        let indices: Vec<usize> = (0..images.len()).collect();
        let mut out = Vec::with_capacity(images.len());
        for chunk in indices.chunks(INFERENCE_BATCH) {
            let probs = model
                .forward_probabilities(images_tensor::<TrainBackend>(images, chunk, &device));
            let [rows, classes] = probs.dims();
            let values = to_vec(probs)?;
            out.extend(values.chunks(classes.max(1)).take(rows).map(<[f32]>::to_vec));
        }
        Ok(out)
    }

    fn save(&self, model: &Self::Model, path: &Path) -> Result<PathBuf, TrainingError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let path = path.with_extension("bin");
        model
            .clone()
            .save_file(path.clone(), &recorder)
            .map_err(|e| TrainingError::Checkpoint {
                path: path.clone(),
                msg: format!("failed to save checkpoint: {e}"),
            })?;
        info!(path = %path.display(), "saved checkpoint");
        Ok(path)
    }
}
