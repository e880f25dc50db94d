//! Pipeline Configuration
//!
//! Every tunable of a run lives in [`PipelineConfig`]. Defaults reproduce the
//! reference setup (28x28 inputs, batch 32, 50 epochs, Adam at 1e-3); a TOML
//! file can override any subset of fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::labels::DEFAULT_LABELS;
use crate::utils::error::{HandSignError, Result};

/// Default archive URL of the hand-sign dataset
pub const DEFAULT_DATASET_URL: &str =
    "https://github.com/lesterchia1/hand_sign_datasets/raw/main/hand_sign_datasets.7z";

/// Full configuration of a pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    pub augmentation: AugmentationConfig,
    pub training: TrainingConfig,
    pub labels: LabelConfig,
    pub output: OutputConfig,
}

/// Where the dataset comes from and how it is laid out on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    /// Remote archive URL
    pub url: String,
    /// Directory the archive is downloaded into
    pub download_dir: PathBuf,
    /// Directory the archive is extracted into
    pub extract_root: PathBuf,
    /// Name of the top-level directory inside the archive
    pub dataset_dir_name: String,
    /// Training split folder name
    pub train_dir: String,
    /// Validation split candidates, tried in order
    pub validation_dirs: Vec<String>,
    /// Delete the archive after a successful extraction
    pub remove_archive: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATASET_URL.to_string(),
            download_dir: PathBuf::from("data"),
            extract_root: PathBuf::from("data/extracted_data"),
            dataset_dir_name: "hand_sign_datasets".to_string(),
            train_dir: "Train".to_string(),
            validation_dirs: vec!["Val".to_string(), "Test".to_string()],
            remove_archive: false,
        }
    }
}

impl DatasetConfig {
    /// `extract_root/dataset_dir_name`
    pub fn dataset_dir(&self) -> PathBuf {
        self.extract_root.join(&self.dataset_dir_name)
    }

    /// Local path of the downloaded archive, named after the last URL segment
    pub fn archive_path(&self) -> PathBuf {
        let name = self
            .url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("dataset_archive");
        self.download_dir.join(name)
    }

    pub fn train_path(&self) -> PathBuf {
        self.dataset_dir().join(&self.train_dir)
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Square side length images are resized to
    pub image_size: usize,
    /// Seed for shuffling and augmentation
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: crate::EPOCHS,
            batch_size: crate::BATCH_SIZE,
            learning_rate: 1e-3,
            image_size: crate::IMAGE_SIZE,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(HandSignError::Config("training.epochs must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(HandSignError::Config("training.batch_size must be > 0".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(HandSignError::Config(
                "training.learning_rate must be positive".into(),
            ));
        }
        // three valid 3x3 conv + 2x2 pool blocks need at least 22 pixels
        if self.image_size < 22 {
            return Err(HandSignError::Config(format!(
                "training.image_size must be >= 22, got {}",
                self.image_size
            )));
        }
        Ok(())
    }
}

/// Class label table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelConfig {
    /// Display labels in class-index order
    pub table: Vec<String>,
    /// Fail when the table disagrees with the discovered folders.
    /// When false, a warning is logged and folder names are used instead.
    pub strict: bool,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            strict: true,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Image used for the post-training example prediction
    pub sample_image: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            sample_image: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HandSignError::PathNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        if self.dataset.validation_dirs.is_empty() {
            return Err(HandSignError::Config(
                "dataset.validation_dirs needs at least one candidate".into(),
            ));
        }
        self.augmentation.validate()?;
        Ok(())
    }
}
