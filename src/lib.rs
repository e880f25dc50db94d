//! # handsign
//!
//! Trains a small convolutional network to recognize American Sign Language
//! hand-sign letters, using the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: archive download, directory-labeled splits, augmentation and batch producers
//! - `model`: the three-block CNN
//! - `training`: the epoch loop, evaluation and training history
//! - `inference`: loading a saved model and predicting letters for images
//! - `pipeline`: every stage chained into one run
//! - `utils`: errors, logging and SVG training curves
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use handsign::backend::{default_device, TrainingBackend};
//! use handsign::{run_pipeline, PipelineConfig};
//!
//! let summary = run_pipeline::<TrainingBackend>(&PipelineConfig::default(), default_device())?;
//! println!("validation accuracy: {:.2}%", summary.validation_accuracy * 100.0);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::PipelineConfig;
pub use dataset::{BatchProducer, HandSignDataset, LabelTable};
pub use inference::{PredictionResult, Predictor};
pub use model::{HandSignCnn, HandSignCnnConfig};
pub use pipeline::{run_pipeline, RunSummary};
pub use training::{Trainer, TrainingHistory};
pub use utils::error::{HandSignError, Result};

/// Static hand-sign letters (A-Y without J)
pub const NUM_CLASSES: usize = 24;

/// Side length images are resized to
pub const IMAGE_SIZE: usize = 28;

pub const BATCH_SIZE: usize = 32;

pub const EPOCHS: usize = 50;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
