//! Batch producers
//!
//! A [`BatchProducer`] walks a cached split in batch-sized steps and cycles
//! forever: once every sample has been served the epoch counter advances and,
//! for shuffled producers, a new permutation is drawn. The final batch of an
//! epoch holds the remainder and may be short.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::burn_dataset::{
    HandSignBatch, HandSignBatcher, HandSignImageDataset, HandSignItem, PreparedItem,
};
use crate::dataset::loader::{DatasetStats, HandSignDataset};
use crate::utils::error::{HandSignError, Result};

/// How a producer prepares and orders its samples
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    pub batch_size: usize,
    pub image_size: usize,
    pub augmentation: AugmentationConfig,
    pub shuffle: bool,
    pub seed: u64,
}

impl ProducerOptions {
    /// Augmented and shuffled
    pub fn training(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.training.batch_size,
            image_size: config.training.image_size,
            augmentation: config.augmentation.clone(),
            shuffle: true,
            seed: config.training.seed,
        }
    }

    /// Rescale only, fixed order
    pub fn validation(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.training.batch_size,
            image_size: config.training.image_size,
            augmentation: AugmentationConfig {
                rescale: config.augmentation.rescale,
                ..AugmentationConfig::rescale_only()
            },
            shuffle: false,
            seed: config.training.seed,
        }
    }
}

/// Stateful, endlessly cycling source of batches over one split
#[derive(Debug)]
pub struct BatchProducer {
    dataset: HandSignImageDataset,
    class_names: Vec<String>,
    stats: Option<DatasetStats>,
    augmenter: Augmenter,
    batcher: HandSignBatcher,
    batch_size: usize,
    shuffle: bool,
    rng: ChaCha8Rng,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
}

impl BatchProducer {
    /// Scan `dir`, cache its images and build a producer
    pub fn from_directory(dir: &Path, options: ProducerOptions) -> Result<Self> {
        let split = HandSignDataset::new(dir)?;
        let augmenter = Augmenter::new(options.augmentation.clone(), options.image_size as u32);
        let dataset = HandSignImageDataset::load(&split.samples, &augmenter);

        let mut producer = Self::from_dataset(dataset, split.class_names.clone(), options)?;
        producer.stats = Some(split.get_stats());
        Ok(producer)
    }

    /// Build a producer over already decoded items
    pub fn from_dataset(
        dataset: HandSignImageDataset,
        class_names: Vec<String>,
        options: ProducerOptions,
    ) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(HandSignError::Config("batch_size must be > 0".into()));
        }
        if class_names.is_empty() {
            return Err(HandSignError::Dataset("producer needs at least one class".into()));
        }
        let num_classes = class_names.len();
        if let Some(bad) = dataset.items().iter().find(|i| i.label >= num_classes) {
            return Err(HandSignError::Dataset(format!(
                "label {} of {:?} is outside {} classes",
                bad.label, bad.path, num_classes
            )));
        }

        let mut producer = Self {
            order: (0..dataset.len()).collect(),
            dataset,
            class_names,
            stats: None,
            augmenter: Augmenter::new(options.augmentation, options.image_size as u32),
            batcher: HandSignBatcher::new(options.image_size, num_classes),
            batch_size: options.batch_size,
            shuffle: options.shuffle,
            rng: ChaCha8Rng::seed_from_u64(options.seed),
            cursor: 0,
            epoch: 0,
        };
        producer.reshuffle();
        Ok(producer)
    }

    /// Number of samples per epoch
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Completed passes over the data
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Per-class counts from the directory scan, when built from disk
    pub fn stats(&self) -> Option<&DatasetStats> {
        self.stats.as_ref()
    }

    /// Source file and label of the `index`-th cached sample
    pub fn sample(&self, index: usize) -> Option<(&Path, usize)> {
        self.dataset
            .items()
            .get(index)
            .map(|item| (item.path.as_path(), item.label))
    }

    /// ceil(len / batch_size)
    pub fn steps_per_epoch(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// Rewind to the start of the current ordering
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    fn reshuffle(&mut self) {
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    /// Produce the next batch, wrapping to a new epoch when exhausted
    pub fn next_batch<B: Backend>(&mut self, device: &B::Device) -> Result<HandSignBatch<B>> {
        if self.is_empty() {
            return Err(HandSignError::EmptyDataset(
                "batch producer has no samples".into(),
            ));
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = self.order[self.cursor..end].to_vec();
        let mut items = Vec::with_capacity(indices.len());
        for idx in indices {
            if let Some(item) = self.dataset.get(idx) {
                items.push(self.prepare(&item));
            }
        }

        self.cursor = end;
        if self.cursor >= self.order.len() {
            self.cursor = 0;
            self.epoch += 1;
            self.reshuffle();
            debug!("Producer wrapped to epoch {}", self.epoch);
        }

        Ok(<HandSignBatcher as Batcher<B, PreparedItem, HandSignBatch<B>>>::batch(
            &self.batcher,
            items,
            device,
        ))
    }

    fn prepare(&mut self, item: &HandSignItem) -> PreparedItem {
        PreparedItem {
            image: self.augmenter.augment(&item.image, &mut self.rng),
            label: item.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use std::path::PathBuf;

    type TestBackend = NdArray;

    fn toy_dataset(per_class: usize, classes: usize) -> HandSignImageDataset {
        let mut items = Vec::new();
        for label in 0..classes {
            for i in 0..per_class {
                let shade = (30 * label + 7 * i) as u8;
                items.push(HandSignItem {
                    image: ImageBuffer::from_fn(28, 28, |x, _| Rgb([shade, x as u8 * 9, 50])),
                    label,
                    path: PathBuf::from(format!("{label}/{i}.png")),
                });
            }
        }
        HandSignImageDataset::from_items(items)
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| ((b'A' + i as u8) as char).to_string()).collect()
    }

    fn options(batch_size: usize, shuffle: bool) -> ProducerOptions {
        let config = PipelineConfig::default();
        let mut opts = if shuffle {
            ProducerOptions::training(&config)
        } else {
            ProducerOptions::validation(&config)
        };
        opts.batch_size = batch_size;
        opts
    }

    #[test]
    fn test_training_batch_shapes() {
        let mut producer =
            BatchProducer::from_dataset(toy_dataset(5, 3), names(3), options(4, true)).unwrap();
        let device = Default::default();

        let batch: HandSignBatch<TestBackend> = producer.next_batch(&device).unwrap();
        assert_eq!(batch.images.dims(), [4, 3, 28, 28]);
        assert_eq!(batch.labels.dims(), [4, 3]);

        let row_sums: Vec<f32> = batch.labels.sum_dim(1).into_data().iter::<f32>().collect();
        assert!(row_sums.iter().all(|s| (s - 1.0).abs() < 1e-6));

        let pixels: Vec<f32> = batch.images.into_data().iter::<f32>().collect();
        assert!(pixels.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_epoch_wraps_with_short_last_batch() {
        let mut producer =
            BatchProducer::from_dataset(toy_dataset(5, 2), names(2), options(4, true)).unwrap();
        let device = Default::default();
        assert_eq!(producer.steps_per_epoch(), 3);

        let sizes: Vec<usize> = (0..3)
            .map(|_| producer.next_batch::<TestBackend>(&device).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(producer.epoch(), 1);

        // cycles indefinitely
        let batch = producer.next_batch::<TestBackend>(&device).unwrap();
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_validation_producer_is_deterministic() {
        let mut producer =
            BatchProducer::from_dataset(toy_dataset(3, 2), names(2), options(6, false)).unwrap();
        let device = Default::default();

        let first: Vec<f32> = producer
            .next_batch::<TestBackend>(&device)
            .unwrap()
            .images
            .into_data()
            .iter::<f32>()
            .collect();
        let second: Vec<f32> = producer
            .next_batch::<TestBackend>(&device)
            .unwrap()
            .images
            .into_data()
            .iter::<f32>()
            .collect();

        assert_eq!(first, second);
        // rescale only: first pixel of the first image is shade 0 / 255
        assert_eq!(first[0], 0.0);
    }

    #[test]
    fn test_validation_keeps_directory_order() {
        let mut producer =
            BatchProducer::from_dataset(toy_dataset(2, 3), names(3), options(6, false)).unwrap();
        let device = Default::default();
        let targets: Vec<i64> = producer
            .next_batch::<TestBackend>(&device)
            .unwrap()
            .targets
            .into_data()
            .iter::<i64>()
            .collect();
        assert_eq!(targets, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_empty_producer_errors() {
        let mut producer = BatchProducer::from_dataset(
            HandSignImageDataset::default(),
            names(2),
            options(4, false),
        )
        .unwrap();
        assert_eq!(producer.steps_per_epoch(), 0);
        assert!(matches!(
            producer.next_batch::<TestBackend>(&Default::default()),
            Err(HandSignError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_label_out_of_range_rejected() {
        let result = BatchProducer::from_dataset(toy_dataset(1, 3), names(2), options(4, false));
        assert!(matches!(result, Err(HandSignError::Dataset(_))));
    }

    #[test]
    fn test_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        crate::dataset::loader::tests::write_toy_split(dir.path(), &["A", "B"], 4);

        let mut producer = BatchProducer::from_directory(dir.path(), options(3, true)).unwrap();
        assert_eq!(producer.len(), 8);
        assert_eq!(producer.class_names(), &["A".to_string(), "B".to_string()]);
        assert_eq!(producer.stats().unwrap().class_counts, vec![4, 4]);
        assert_eq!(producer.sample(0).map(|(_, label)| label), Some(0));
        assert!(producer.sample(8).is_none());

        let batch = producer.next_batch::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(batch.images.dims(), [3, 3, 28, 28]);
    }
}
