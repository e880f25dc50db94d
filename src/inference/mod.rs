//! Inference module for model prediction
//!
//! Loads a saved model directory (`model.mpk`, `model_config.json`,
//! `labels.json`, `preprocess.json`) and predicts hand-sign letters for image files.

pub mod predictor;

pub use predictor::{
    predict_probabilities, PredictionResult, Predictor, Preprocessing, LABELS_FILE,
    PREPROCESS_FILE,
};
