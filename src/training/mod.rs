//! Training module
//!
//! - [`trainer`]: the epoch loop, evaluation and model saving
//! - [`history`]: per-epoch loss and accuracy records

pub mod history;
pub mod trainer;

pub use history::{EpochMetrics, TrainingHistory};
pub use trainer::{adam_trainer, Evaluation, Trainer};
