//! Inference Predictor Module
//!
//! Runs a trained [`HandSignCnn`] on image files. Images go through the same
//! preparation as the validation split (nearest resize, rescale, CHW layout)
//! and the winning class index is mapped through the label table.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::dataset::labels::LabelTable;
use crate::dataset::loader::load_image;
use crate::model::{HandSignCnn, HandSignCnnConfig};
use crate::training::trainer::{MODEL_CONFIG_FILE, MODEL_FILE_STEM};
use crate::utils::error::{HandSignError, Result, ResultExt};

pub const LABELS_FILE: &str = "labels.json";
pub const PREPROCESS_FILE: &str = "preprocess.json";

/// Pixel preparation the model was trained with, saved next to the weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub rescale: f32,
}

impl Preprocessing {
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self {
            rescale: AugmentationConfig::default().rescale,
        }
    }
}

/// Number of ranked alternatives kept in a [`PredictionResult`]
const TOP_K: usize = 5;

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Path to the input image (if applicable)
    pub image_path: Option<PathBuf>,

    /// Predicted class index
    pub class_index: usize,

    /// Letter of the predicted class
    pub label: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// Top-k predictions with their probabilities
    pub top_k: Vec<(usize, String, f32)>,

    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl PredictionResult {
    pub fn new(
        probabilities: Vec<f32>,
        labels: &LabelTable,
        inference_time: Duration,
        image_path: Option<PathBuf>,
    ) -> Self {
        let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (class_index, confidence) = ranked.first().copied().unwrap_or((0, 0.0));
        let name = |idx: usize| labels.label(idx).unwrap_or("?").to_string();

        let top_k = ranked
            .iter()
            .take(TOP_K)
            .map(|&(idx, prob)| (idx, name(idx), prob))
            .collect();

        Self {
            image_path,
            class_index,
            label: name(class_index),
            confidence,
            probabilities,
            top_k,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        }
    }

    /// Gap between the two most likely classes
    pub fn margin(&self) -> f32 {
        match self.top_k.as_slice() {
            [first, second, ..] => first.2 - second.2,
            _ => self.confidence,
        }
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        if let Some(path) = &self.image_path {
            output.push_str(&format!("Image: {:?}\n", path));
        }
        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.label, self.class_index
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Margin over runner-up: {:.2}%\n", self.margin() * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str(&format!("\nTop-{} predictions:\n", self.top_k.len()));
        for (i, (idx, name, prob)) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (class {}) - {:.2}%\n",
                i + 1,
                name,
                idx,
                prob * 100.0
            ));
        }

        output
    }
}

/// Softmax probabilities, one row per image of a `[N, C, H, W]` batch.
///
/// The batch must match the channel count and input size the model was
/// built for.
pub fn predict_probabilities<B: Backend>(
    model: &HandSignCnn<B>,
    config: &HandSignCnnConfig,
    images: Tensor<B, 4>,
) -> Result<Vec<Vec<f32>>> {
    let [batch, channels, height, width] = images.dims();
    if channels != config.in_channels || height != config.input_size || width != config.input_size
    {
        return Err(HandSignError::InvalidInput(format!(
            "expected [N, {}, {}, {}] input, got [{}, {}, {}, {}]",
            config.in_channels,
            config.input_size,
            config.input_size,
            batch,
            channels,
            height,
            width
        )));
    }

    let probs: Vec<f32> = model
        .forward_softmax(images)
        .into_data()
        .iter::<f32>()
        .collect();

    Ok(probs
        .chunks(model.num_classes())
        .map(|row| row.to_vec())
        .collect())
}

/// Predictor for running inference with a trained model
pub struct Predictor<B: Backend> {
    model: HandSignCnn<B>,
    model_config: HandSignCnnConfig,
    labels: LabelTable,
    augmenter: Augmenter,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Wrap an in-memory model. `rescale` must match the one used in training.
    pub fn new(
        model: HandSignCnn<B>,
        model_config: HandSignCnnConfig,
        labels: LabelTable,
        rescale: f32,
        device: B::Device,
    ) -> Result<Self> {
        model.ensure_num_classes(labels.len())?;

        let augmentation = AugmentationConfig {
            rescale,
            ..AugmentationConfig::rescale_only()
        };
        let augmenter = Augmenter::new(augmentation, model_config.input_size as u32);

        Ok(Self {
            model,
            model_config,
            labels,
            augmenter,
            device,
        })
    }

    /// Write the label table and preprocessing next to saved weights
    pub fn save(&self, model_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(model_dir)?;
        self.labels.save(&model_dir.join(LABELS_FILE))?;
        Preprocessing {
            rescale: self.augmenter.config().rescale,
        }
        .save(&model_dir.join(PREPROCESS_FILE))
    }

    /// Load the weights, architecture, label table and preprocessing saved
    /// in `model_dir`
    pub fn load(model_dir: &Path, device: B::Device) -> Result<Self> {
        if !model_dir.is_dir() {
            return Err(HandSignError::PathNotFound(model_dir.to_path_buf()));
        }
        info!("Loading model from {:?}", model_dir);

        let model_config = HandSignCnnConfig::load(model_dir.join(MODEL_CONFIG_FILE))
            .map_err(|e| HandSignError::Model(format!("failed to read model config: {e:?}")))?;
        let labels = LabelTable::load(&model_dir.join(LABELS_FILE))?;

        let preprocess_path = model_dir.join(PREPROCESS_FILE);
        let preprocessing = if preprocess_path.is_file() {
            Preprocessing::load(&preprocess_path)?
        } else {
            warn!(
                "{:?} missing, assuming the default rescale",
                preprocess_path
            );
            Preprocessing::default()
        };

        let model = HandSignCnn::new(&model_config, &device)?
            .load_file(model_dir.join(MODEL_FILE_STEM), &CompactRecorder::new(), &device)
            .map_err(|e| HandSignError::Model(format!("failed to load weights: {e:?}")))?;

        Self::new(
            model,
            model_config,
            labels,
            preprocessing.rescale,
            device,
        )
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Decode, resize and rescale an image into a flat CHW buffer
    pub fn preprocess(&self, path: &Path) -> Result<Vec<f32>> {
        let image = load_image(path)?;
        Ok(self.augmenter.to_tensor_data(&self.augmenter.resize(&image)))
    }

    /// Predict the letter shown in the image at `path`
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let pixels = self.preprocess(path)?;
        let size = self.model_config.input_size;

        let start = Instant::now();
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [1, self.model_config.in_channels, size, size]),
            &self.device,
        );
        let probabilities = predict_probabilities(&self.model, &self.model_config, images)?
            .into_iter()
            .next()
            .context("model returned no prediction")?;

        Ok(PredictionResult::new(
            probabilities,
            &self.labels,
            start.elapsed(),
            Some(path.to_path_buf()),
        ))
    }

    /// Predict every image in `paths`, one at a time
    pub fn predict_batch(&self, paths: &[PathBuf]) -> Result<Vec<PredictionResult>> {
        paths.iter().map(|path| self.predict_file(path)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};

    type TestBackend = NdArray;

    fn labels(names: &[&str]) -> LabelTable {
        LabelTable::new(names.iter().map(|s| s.to_string()).collect())
    }

    fn write_image(path: &Path) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(40, 40, |x, y| Rgb([(x * 6) as u8, (y * 6) as u8, 90]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_prediction_result_ranks_classes() {
        let result = PredictionResult::new(
            vec![0.1, 0.7, 0.2],
            &labels(&["A", "B", "C"]),
            Duration::from_millis(3),
            None,
        );

        assert_eq!(result.class_index, 1);
        assert_eq!(result.label, "B");
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.top_k.len(), 3);
        assert_eq!(result.top_k[1].1, "C");
        assert!((result.margin() - 0.5).abs() < 1e-6);
        assert!(result.display().contains("Prediction: B"));
        assert!(result.display().contains("Margin over runner-up: 50.00%"));
    }

    #[test]
    fn test_predict_probabilities_rejects_wrong_size() {
        let device = Default::default();
        let config = HandSignCnnConfig::new().with_num_classes(2);
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();

        let images = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        assert!(matches!(
            predict_probabilities(&model, &config, images),
            Err(HandSignError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_label_count_must_match_model() {
        let device = Default::default();
        let config = HandSignCnnConfig::new().with_num_classes(3);
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();

        let result = Predictor::new(model, config, labels(&["A", "B"]), 1.0 / 255.0, device);
        assert!(matches!(result, Err(HandSignError::ClassCountMismatch { .. })));
    }

    #[test]
    fn test_predict_file() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("sign.png");
        write_image(&image_path);

        let device = Default::default();
        let config = HandSignCnnConfig::new().with_num_classes(2);
        let model: HandSignCnn<TestBackend> = HandSignCnn::new(&config, &device).unwrap();
        let predictor =
            Predictor::new(model, config, labels(&["A", "B"]), 1.0 / 255.0, device).unwrap();

        let result = predictor.predict_file(&image_path).unwrap();
        assert_eq!(result.probabilities.len(), 2);
        assert!((result.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(["A", "B"].contains(&result.label.as_str()));
    }

    #[test]
    fn test_load_missing_dir() {
        let result = Predictor::<TestBackend>::load(Path::new("/nonexistent/model"), Default::default());
        assert!(matches!(result, Err(HandSignError::PathNotFound(_))));
    }

    #[test]
    fn test_save_then_load_predicts_alike() {
        use crate::config::TrainingConfig;
        use crate::training::adam_trainer;
        use burn::backend::Autodiff;
        use burn::module::AutodiffModule;

        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("sign.png");
        write_image(&image_path);

        let model_config = HandSignCnnConfig::new().with_num_classes(2);
        let trainer = adam_trainer::<Autodiff<TestBackend>>(
            model_config.clone(),
            TrainingConfig::default(),
            Default::default(),
        )
        .unwrap();
        trainer.save(dir.path()).unwrap();

        let in_memory = Predictor::new(
            trainer.model().valid(),
            model_config,
            labels(&["A", "B"]),
            1.0 / 255.0,
            Default::default(),
        )
        .unwrap();
        in_memory.save(dir.path()).unwrap();
        let reloaded = Predictor::<TestBackend>::load(dir.path(), Default::default()).unwrap();

        let a = in_memory.predict_file(&image_path).unwrap();
        let b = reloaded.predict_file(&image_path).unwrap();
        // weights are stored at half precision
        for (x, y) in a.probabilities.iter().zip(&b.probabilities) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn test_load_uses_saved_rescale() {
        use crate::config::TrainingConfig;
        use crate::training::adam_trainer;
        use burn::backend::Autodiff;

        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("sign.png");
        write_image(&image_path);

        let model_config = HandSignCnnConfig::new().with_num_classes(2);
        let trainer = adam_trainer::<Autodiff<TestBackend>>(
            model_config,
            TrainingConfig::default(),
            Default::default(),
        )
        .unwrap();
        trainer.save(dir.path()).unwrap();
        labels(&["A", "B"]).save(&dir.path().join(LABELS_FILE)).unwrap();

        // no preprocess.json yet
        let fallback = Predictor::<TestBackend>::load(dir.path(), Default::default()).unwrap();
        let default_pixels = fallback.preprocess(&image_path).unwrap();

        Preprocessing { rescale: 1.0 }
            .save(&dir.path().join(PREPROCESS_FILE))
            .unwrap();
        let reloaded = Predictor::<TestBackend>::load(dir.path(), Default::default()).unwrap();
        let raw_pixels = reloaded.preprocess(&image_path).unwrap();

        assert!(raw_pixels.iter().any(|&p| p > 1.0));
        for (raw, scaled) in raw_pixels.iter().zip(&default_pixels) {
            assert!((raw / 255.0 - scaled).abs() < 1e-5);
        }
    }
}
