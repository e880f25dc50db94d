//! Burn Dataset Integration
//!
//! Images are decoded and resized once, kept in memory as small RGB buffers,
//! and turned into tensors batch by batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::dataset::augmentation::Augmenter;
use crate::dataset::loader::{load_image, ImageSample};

/// A decoded, resized image with its class index
#[derive(Clone, Debug)]
pub struct HandSignItem {
    pub image: RgbImage,
    pub label: usize,
    pub path: PathBuf,
}

/// In-memory image dataset implementing Burn's Dataset trait
#[derive(Clone, Debug, Default)]
pub struct HandSignImageDataset {
    items: Vec<HandSignItem>,
}

impl HandSignImageDataset {
    pub fn from_items(items: Vec<HandSignItem>) -> Self {
        Self { items }
    }

    /// Decode and resize every sample in parallel.
    ///
    /// Files that fail to decode are skipped with a warning; sample order is
    /// preserved for the rest.
    pub fn load(samples: &[ImageSample], augmenter: &Augmenter) -> Self {
        let total = samples.len();
        info!("Pre-loading {} images at {}px", total, augmenter.image_size());

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicUsize::new(0);
        let items: Vec<HandSignItem> = samples
            .par_iter()
            .filter_map(|sample| {
                let result = match load_image(&sample.path) {
                    Ok(img) => Some(HandSignItem {
                        image: augmenter.resize(&img),
                        label: sample.label,
                        path: sample.path.clone(),
                    }),
                    Err(e) => {
                        warn!("Skipping unreadable image: {}", e);
                        None
                    }
                };
                let count = loaded.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 100 == 0 || count == total {
                    pb.set_position(count as u64);
                }
                result
            })
            .collect();

        pb.finish_and_clear();
        if items.len() < total {
            warn!("Loaded {} of {} images", items.len(), total);
        } else {
            info!("Loaded {} images", items.len());
        }

        Self { items }
    }

    pub fn items(&self) -> &[HandSignItem] {
        &self.items
    }
}

impl Dataset<HandSignItem> for HandSignImageDataset {
    fn get(&self, index: usize) -> Option<HandSignItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// CHW float image ready for batching
#[derive(Clone, Debug)]
pub struct PreparedItem {
    /// Flattened [3 * H * W]
    pub image: Vec<f32>,
    pub label: usize,
}

/// A batch of hand-sign images
#[derive(Clone, Debug)]
pub struct HandSignBatch<B: Backend> {
    /// [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
    /// One-hot labels, [batch_size, num_classes]
    pub labels: Tensor<B, 2>,
}

impl<B: Backend> HandSignBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batcher stacking prepared items into a [`HandSignBatch`]
#[derive(Clone, Debug)]
pub struct HandSignBatcher {
    image_size: usize,
    num_classes: usize,
}

impl HandSignBatcher {
    pub fn new(image_size: usize, num_classes: usize) -> Self {
        Self {
            image_size,
            num_classes,
        }
    }
}

impl<B: Backend> Batcher<B, PreparedItem, HandSignBatch<B>> for HandSignBatcher {
    fn batch(&self, items: Vec<PreparedItem>, device: &B::Device) -> HandSignBatch<B> {
        let batch_size = items.len();
        let (h, w) = (self.image_size, self.image_size);

        let mut images_data = Vec::with_capacity(batch_size * 3 * h * w);
        let mut targets_data = Vec::with_capacity(batch_size);
        let mut one_hot = vec![0.0f32; batch_size * self.num_classes];

        for (row, item) in items.into_iter().enumerate() {
            one_hot[row * self.num_classes + item.label] = 1.0;
            targets_data.push(item.label as i64);
            images_data.extend(item.image);
        }

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, h, w]),
            device,
        );
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);
        let labels = Tensor::<B, 2>::from_floats(
            TensorData::new(one_hot, [batch_size, self.num_classes]),
            device,
        );

        HandSignBatch {
            images,
            targets,
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batcher_shapes_and_one_hot() {
        let batcher = HandSignBatcher::new(4, 3);
        let items = vec![
            PreparedItem {
                image: vec![0.5; 3 * 4 * 4],
                label: 2,
            },
            PreparedItem {
                image: vec![0.1; 3 * 4 * 4],
                label: 0,
            },
        ];
        let device = Default::default();

        let batch: HandSignBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.labels.dims(), [2, 3]);
        assert_eq!(batch.len(), 2);

        let labels: Vec<f32> = batch.labels.into_data().iter::<f32>().collect();
        assert_eq!(labels, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
        assert_eq!(targets, vec![2, 0]);
    }

    #[test]
    fn test_load_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        crate::dataset::loader::tests::write_toy_split(dir.path(), &["A"], 2);
        let bad = dir.path().join("A").join("broken.png");
        std::fs::write(&bad, b"not an image").unwrap();

        let mut samples: Vec<ImageSample> = crate::dataset::HandSignDataset::new(dir.path())
            .unwrap()
            .samples;
        samples.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(samples.len(), 3);

        let ds = HandSignImageDataset::load(&samples, &Augmenter::rescale_only(28));
        assert_eq!(ds.len(), 2);
        assert!(ds.items().iter().all(|i| i.image.dimensions() == (28, 28)));
    }
}
