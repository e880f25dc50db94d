//! End-to-end pipeline
//!
//! Acquire the dataset, build both producers, train, plot, evaluate, save and
//! run one example prediction. All state lives in the [`Trainer`] and the
//! producers created here; nothing is global.
//!
//! [`Trainer`]: crate::training::Trainer

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PipelineConfig;
use crate::dataset::{build_producers, ensure_dataset, AcquireOutcome, LabelTable};
use crate::inference::{PredictionResult, Predictor};
use crate::model::HandSignCnnConfig;
use crate::training::adam_trainer;
use crate::utils::charts::plot_history;
use crate::utils::error::Result;

pub const HISTORY_FILE: &str = "history.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// What a finished run produced, written as `summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub epochs: usize,
    pub num_classes: usize,
    pub labels: Vec<String>,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub final_train_accuracy: f64,
    pub validation_loss: f64,
    pub validation_accuracy: f64,
    pub best_epoch: Option<usize>,
    pub model_path: PathBuf,
    pub example_prediction: Option<PredictionResult>,
}

/// Run every stage with `config` on `device`
pub fn run_pipeline<B: AutodiffBackend>(
    config: &PipelineConfig,
    device: B::Device,
) -> Result<RunSummary> {
    config.validate()?;
    let output_dir = &config.output.dir;
    std::fs::create_dir_all(output_dir)?;

    println!("{}", "Acquiring Dataset...".cyan());
    match ensure_dataset(&config.dataset)? {
        AcquireOutcome::AlreadyPresent(dir) => info!("Dataset already present at {:?}", dir),
        AcquireOutcome::Downloaded(dir) => info!("Dataset extracted to {:?}", dir),
    }

    println!("{}", "Loading Splits...".cyan());
    let splits = build_producers(config)?;
    let (mut train, mut validation) = (splits.train, splits.validation);
    for stats in [train.stats(), validation.stats()].into_iter().flatten() {
        stats.print();
    }

    let labels = LabelTable::resolve(&config.labels, train.class_names())?;
    info!("Labels: {}", labels.labels().join(" "));

    let model_config = HandSignCnnConfig::new()
        .with_num_classes(train.num_classes())
        .with_input_size(config.training.image_size);
    info!(
        "Model: 3 conv blocks, {} flattened features, {} classes",
        model_config.flattened_features(),
        model_config.num_classes
    );

    println!("{}", "Training...".green().bold());
    let mut trainer = adam_trainer::<B>(model_config.clone(), config.training.clone(), device)?;
    trainer.fit(&mut train, &mut validation)?;

    let history = trainer.history();
    plot_history(history, output_dir)?;
    history.save(&output_dir.join(HISTORY_FILE))?;

    println!("{}", "Evaluating...".cyan());
    let evaluation = trainer.evaluate(&mut validation)?;
    println!(
        "  Validation loss: {:.4}  accuracy: {:.2}%",
        evaluation.loss,
        evaluation.accuracy * 100.0
    );

    let model_path = trainer.save(output_dir)?;
    let predictor = Predictor::new(
        trainer.model().valid(),
        model_config,
        labels.clone(),
        config.augmentation.rescale,
        trainer.device().clone(),
    )?;
    predictor.save(output_dir)?;

    let sample = config
        .output
        .sample_image
        .clone()
        .or_else(|| validation.sample(0).map(|(path, _)| path.to_path_buf()));
    let example_prediction = match sample {
        Some(path) => {
            let prediction = predictor.predict_file(&path)?;
            println!("{}", "Example Prediction:".cyan().bold());
            print!("{}", prediction.display());
            Some(prediction)
        }
        None => None,
    };

    let summary = RunSummary {
        timestamp: chrono::Local::now().to_rfc3339(),
        epochs: history.len(),
        num_classes: labels.len(),
        labels: labels.labels().to_vec(),
        train_samples: train.len(),
        validation_samples: validation.len(),
        final_train_accuracy: history.last().map(|m| m.accuracy).unwrap_or(0.0),
        validation_loss: evaluation.loss,
        validation_accuracy: evaluation.accuracy,
        best_epoch: history.best_epoch().map(|m| m.epoch),
        model_path,
        example_prediction,
    };
    std::fs::write(
        output_dir.join(SUMMARY_FILE),
        serde_json::to_string_pretty(&summary)?,
    )?;

    println!(
        "{} Outputs written to {}",
        "Done!".green().bold(),
        output_dir.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::loader::tests::write_toy_split;
    use crate::inference::{Preprocessing, LABELS_FILE, PREPROCESS_FILE};
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    fn toy_config(root: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.dataset.extract_root = root.join("extracted");
        config.training.epochs = 1;
        config.training.batch_size = 4;
        config.labels.table = vec!["A".into(), "B".into()];
        config.output.dir = root.join("output");
        config
    }

    #[test]
    fn test_toy_run_writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = toy_config(dir.path());
        let ds = config.dataset.dataset_dir();
        write_toy_split(&ds.join("Train"), &["A", "B"], 4);
        write_toy_split(&ds.join("Val"), &["A", "B"], 2);

        let summary = run_pipeline::<Autodiff<NdArray>>(&config, Default::default()).unwrap();

        assert_eq!(summary.epochs, 1);
        assert_eq!(summary.num_classes, 2);
        assert_eq!(summary.train_samples, 8);
        let prediction = summary.example_prediction.unwrap();
        assert_eq!(prediction.probabilities.len(), 2);
        assert!((prediction.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-4);

        let out = &config.output.dir;
        for file in [
            "model.mpk",
            "model_config.json",
            LABELS_FILE,
            PREPROCESS_FILE,
            HISTORY_FILE,
            SUMMARY_FILE,
            "accuracy.svg",
            "loss.svg",
        ] {
            assert!(out.join(file).exists(), "missing {file}");
        }
        let saved = Preprocessing::load(&out.join(PREPROCESS_FILE)).unwrap();
        assert_eq!(saved.rescale, config.augmentation.rescale);
    }

    #[test]
    fn test_strict_label_mismatch_stops_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = toy_config(dir.path());
        config.labels.table = vec!["X".into(), "Y".into()];
        let ds = config.dataset.dataset_dir();
        write_toy_split(&ds.join("Train"), &["A", "B"], 2);
        write_toy_split(&ds.join("Test"), &["A", "B"], 1);

        let result = run_pipeline::<Autodiff<NdArray>>(&config, Default::default());
        assert!(matches!(
            result,
            Err(crate::utils::error::HandSignError::LabelMismatch { .. })
        ));
        assert!(!config.output.dir.join("model.mpk").exists());
    }
}
