//! Dataset module for hand-sign data handling
//!
//! This module provides functionality for:
//! - Fetching and unpacking the dataset archive
//! - Scanning directory-labeled splits (`<split>/<class>/<images>`)
//! - Keras-style random augmentation for training
//! - Cycling batch producers for training and validation
//! - The class label table

pub mod acquire;
pub mod augmentation;
pub mod burn_dataset;
pub mod labels;
pub mod loader;
pub mod producer;

pub use acquire::{ensure_dataset, AcquireOutcome};
pub use augmentation::{AugmentationConfig, Augmenter, FillMode};
pub use burn_dataset::{HandSignBatch, HandSignBatcher, HandSignImageDataset, HandSignItem};
pub use labels::{LabelTable, DEFAULT_LABELS};
pub use loader::{resolve_split_dir, DatasetStats, HandSignDataset, ImageSample};
pub use producer::{BatchProducer, ProducerOptions};

use tracing::info;

use crate::config::PipelineConfig;
use crate::utils::error::{HandSignError, Result};

/// Training and validation producers sharing one class set
#[derive(Debug)]
pub struct DataSplits {
    pub train: BatchProducer,
    pub validation: BatchProducer,
}

/// Resolve both split directories and build their producers.
///
/// The validation split must expose the same classes as the training split.
pub fn build_producers(config: &PipelineConfig) -> Result<DataSplits> {
    let dataset_dir = config.dataset.dataset_dir();
    let train_dir = dataset_dir.join(&config.dataset.train_dir);
    let val_dir = resolve_split_dir(&dataset_dir, &config.dataset.validation_dirs)?;

    info!("Training directory: {:?}", train_dir);
    info!("Validation directory: {:?}", val_dir);

    let train = BatchProducer::from_directory(&train_dir, ProducerOptions::training(config))?;
    let validation =
        BatchProducer::from_directory(&val_dir, ProducerOptions::validation(config))?;

    if train.class_names() != validation.class_names() {
        return Err(HandSignError::ClassSetMismatch {
            train: train.class_names().to_vec(),
            validation: validation.class_names().to_vec(),
        });
    }

    Ok(DataSplits { train, validation })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(root: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.dataset.extract_root = root.to_path_buf();
        config
    }

    #[test]
    fn test_build_producers_with_test_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let ds = config.dataset.dataset_dir();
        loader::tests::write_toy_split(&ds.join("Train"), &["A", "B"], 3);
        loader::tests::write_toy_split(&ds.join("Test"), &["A", "B"], 1);

        let splits = build_producers(&config).unwrap();
        assert_eq!(splits.train.len(), 6);
        assert_eq!(splits.validation.len(), 2);
    }

    #[test]
    fn test_build_producers_without_validation_split() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        loader::tests::write_toy_split(&config.dataset.train_path(), &["A"], 1);

        assert!(matches!(
            build_producers(&config),
            Err(HandSignError::SplitNotFound { .. })
        ));
    }

    #[test]
    fn test_build_producers_class_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let ds = config.dataset.dataset_dir();
        loader::tests::write_toy_split(&ds.join("Train"), &["A", "B"], 1);
        loader::tests::write_toy_split(&ds.join("Val"), &["A"], 1);

        assert!(matches!(
            build_producers(&config),
            Err(HandSignError::ClassSetMismatch { .. })
        ));
    }
}
