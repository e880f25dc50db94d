//! Training loop for the hand-sign CNN
//!
//! A hand-written Burn loop: forward pass, categorical cross-entropy on the
//! one-hot labels, backward pass and an Adam step per batch. Each epoch draws
//! `steps_per_epoch` batches from the cycling training producer and then runs
//! one full pass over the validation producer on the inner (non-autodiff)
//! backend.

use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{
        activation::log_softmax,
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::dataset::{BatchProducer, HandSignBatch};
use crate::inference::predictor::predict_probabilities;
use crate::model::{HandSignCnn, HandSignCnnConfig};
use crate::training::history::TrainingHistory;
use crate::utils::error::{HandSignError, Result};
use crate::utils::TrainingLogger;

/// File stem of the saved weights; the recorder appends `.mpk`
pub const MODEL_FILE_STEM: &str = "model";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";

/// Loss and accuracy over one pass of a split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Running, sample-weighted loss and accuracy
#[derive(Debug, Default)]
struct RunningMetrics {
    loss_sum: f64,
    correct: usize,
    total: usize,
}

impl RunningMetrics {
    fn add(&mut self, batch_loss: f64, correct: usize, batch_size: usize) {
        self.loss_sum += batch_loss * batch_size as f64;
        self.correct += correct;
        self.total += batch_size;
    }

    fn finish(&self) -> Evaluation {
        let n = self.total.max(1) as f64;
        Evaluation {
            loss: self.loss_sum / n,
            accuracy: self.correct as f64 / n,
            samples: self.total,
        }
    }
}

/// Trainer owning the model, its optimizer and the epoch history
pub struct Trainer<B: AutodiffBackend, O: Optimizer<HandSignCnn<B>, B>> {
    model: HandSignCnn<B>,
    model_config: HandSignCnnConfig,
    optimizer: O,
    config: TrainingConfig,
    history: TrainingHistory,
    device: B::Device,
}

/// Trainer with the Adam optimizer at its default moments
pub fn adam_trainer<B: AutodiffBackend>(
    model_config: HandSignCnnConfig,
    config: TrainingConfig,
    device: B::Device,
) -> Result<Trainer<B, impl Optimizer<HandSignCnn<B>, B>>> {
    let model = HandSignCnn::new(&model_config, &device)?;
    let optimizer = AdamConfig::new().init::<B, HandSignCnn<B>>();
    Trainer::new(model, model_config, optimizer, config, device)
}

impl<B: AutodiffBackend, O: Optimizer<HandSignCnn<B>, B>> Trainer<B, O> {
    pub fn new(
        model: HandSignCnn<B>,
        model_config: HandSignCnnConfig,
        optimizer: O,
        config: TrainingConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        model.ensure_num_classes(model_config.num_classes)?;

        Ok(Self {
            model,
            model_config,
            optimizer,
            config,
            history: TrainingHistory::default(),
            device,
        })
    }

    pub fn model(&self) -> &HandSignCnn<B> {
        &self.model
    }

    pub fn model_config(&self) -> &HandSignCnnConfig {
        &self.model_config
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Train for `config.epochs` epochs, validating after each one.
    ///
    /// Both producers must expose the model's class set. The history gains
    /// exactly one entry per epoch.
    pub fn fit(
        &mut self,
        train: &mut BatchProducer,
        validation: &mut BatchProducer,
    ) -> Result<&TrainingHistory> {
        self.model.ensure_num_classes(train.num_classes())?;
        if train.class_names() != validation.class_names() {
            return Err(HandSignError::ClassSetMismatch {
                train: train.class_names().to_vec(),
                validation: validation.class_names().to_vec(),
            });
        }
        if train.is_empty() {
            return Err(HandSignError::EmptyDataset(
                "training split has no samples".into(),
            ));
        }
        if validation.is_empty() {
            return Err(HandSignError::EmptyDataset(
                "validation split has no samples".into(),
            ));
        }

        info!(
            "Training for {} epochs: {} steps/epoch, {} validation steps, lr {}",
            self.config.epochs,
            train.steps_per_epoch(),
            validation.steps_per_epoch(),
            self.config.learning_rate
        );

        let mut logger = TrainingLogger::new(self.config.epochs);
        for epoch in 0..self.config.epochs {
            logger.start_epoch(epoch);

            let train_metrics = self.train_epoch(train)?;
            let val_metrics = self.evaluate(validation)?;

            let metrics = self.history.record(
                train_metrics.loss,
                train_metrics.accuracy,
                val_metrics.loss,
                val_metrics.accuracy,
            );
            logger.end_epoch(&metrics);
        }

        if let Some(last) = self.history.last() {
            logger.log_complete(last.val_accuracy);
        }

        Ok(&self.history)
    }

    /// One epoch of `steps_per_epoch` optimizer steps
    pub fn train_epoch(&mut self, producer: &mut BatchProducer) -> Result<Evaluation> {
        let steps = producer.steps_per_epoch();
        if steps == 0 {
            return Err(HandSignError::EmptyDataset(
                "training split has no samples".into(),
            ));
        }

        let lr = self.config.learning_rate;
        let mut running = RunningMetrics::default();

        for step in 0..steps {
            let batch: HandSignBatch<B> = producer.next_batch(&self.device)?;
            let batch_size = batch.len();

            let output = self.model.forward(batch.images);
            let loss = categorical_cross_entropy(output.clone(), batch.labels);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            let correct = count_correct(output, batch.targets);
            running.add(loss_value, correct, batch_size);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(lr, self.model.clone(), grads);

            if (step + 1) % 20 == 0 || step + 1 == steps {
                debug!(
                    "  Batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    step + 1,
                    steps,
                    loss_value,
                    100.0 * running.correct as f64 / running.total.max(1) as f64
                );
            }
        }

        Ok(running.finish())
    }

    /// One full pass over `producer`, starting from its first sample
    pub fn evaluate(&self, producer: &mut BatchProducer) -> Result<Evaluation> {
        if producer.is_empty() {
            return Err(HandSignError::EmptyDataset(
                "cannot evaluate on an empty split".into(),
            ));
        }
        self.model.ensure_num_classes(producer.num_classes())?;

        let model_valid = self.model.valid();
        let mut running = RunningMetrics::default();

        producer.reset();
        for _ in 0..producer.steps_per_epoch() {
            let batch: HandSignBatch<B::InnerBackend> = producer.next_batch(&self.device)?;
            let batch_size = batch.len();

            let output = model_valid.forward(batch.images);
            let loss: f64 = categorical_cross_entropy(output.clone(), batch.labels)
                .into_scalar()
                .elem();
            running.add(loss, count_correct(output, batch.targets), batch_size);
        }

        Ok(running.finish())
    }

    /// Softmax probabilities for a preprocessed `[N, 3, H, W]` batch
    pub fn predict(&self, images: Tensor<B::InnerBackend, 4>) -> Result<Vec<Vec<f32>>> {
        predict_probabilities(&self.model.valid(), &self.model_config, images)
    }

    /// Write the weights and their architecture next to each other in `dir`.
    ///
    /// Returns the path of the weight file.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let stem = dir.join(MODEL_FILE_STEM);
        self.model
            .clone()
            .save_file(stem.clone(), &CompactRecorder::new())
            .map_err(|e| HandSignError::Model(format!("failed to save model: {e:?}")))?;

        let config_path = dir.join(MODEL_CONFIG_FILE);
        self.model_config
            .save(&config_path)
            .map_err(|e| HandSignError::Model(format!("failed to save model config: {e}")))?;

        let weights = stem.with_extension("mpk");
        info!("Model saved to {:?}", weights);
        Ok(weights)
    }
}

/// Mean of `-sum(labels * log_softmax(logits))` over the batch
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    one_hot: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * one_hot)
        .sum_dim(1)
        .mean()
        .neg()
}

/// Rows whose argmax equals the target index
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [batch_size, _] = logits.dims();
    let predictions = logits.argmax(1).reshape([batch_size]);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}
