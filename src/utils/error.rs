//! Error Handling Module
//!
//! Defines the error type shared by the dataset, model, training and
//! inference stages. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for hand-sign pipeline operations
#[derive(Error, Debug)]
pub enum HandSignError {
    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Remote archive could not be fetched
    #[error("Download failed for '{url}': {reason}")]
    Download { url: String, reason: String },

    /// Archive could not be unpacked
    #[error("Failed to extract '{0}': {1}")]
    Extraction(PathBuf, String),

    /// Archive extension is not one we know how to unpack
    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(PathBuf),

    /// None of the candidate split directories exist
    #[error("No split directory found under '{root}' (tried: {})", .tried.join(", "))]
    SplitNotFound { root: PathBuf, tried: Vec<String> },

    /// Generic dataset structure problem
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// A producer with no samples was asked for batches or evaluated
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Label table disagrees with the discovered class folders
    #[error("Label table mismatch at index {index}: expected '{expected}', found folder '{found}'")]
    LabelMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    /// Training and validation splits expose different classes
    #[error("Class sets differ between splits: train={train:?}, validation={validation:?}")]
    ClassSetMismatch {
        train: Vec<String>,
        validation: Vec<String>,
    },

    /// Model output width does not match the dataset
    #[error("Model outputs {model} classes but the dataset has {dataset}")]
    ClassCountMismatch { model: usize, dataset: usize },

    /// Error with model operations (record save/load, tensor conversion)
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for HandSignError {
    fn from(err: serde_json::Error) -> Self {
        HandSignError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for HandSignError {
    fn from(err: toml::de::Error) -> Self {
        HandSignError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HandSignError {
    fn from(err: toml::ser::Error) -> Self {
        HandSignError::Serialization(err.to_string())
    }
}

/// Convenience Result type for hand-sign pipeline operations
pub type Result<T> = std::result::Result<T, HandSignError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| HandSignError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| HandSignError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| HandSignError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| HandSignError::InvalidInput(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HandSignError::Dataset("no classes".to_string());
        assert_eq!(format!("{}", err), "Dataset error: no classes");
    }

    #[test]
    fn test_split_not_found_lists_candidates() {
        let err = HandSignError::SplitNotFound {
            root: PathBuf::from("data/hand_sign_datasets"),
            tried: vec!["Val".to_string(), "Test".to_string()],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Val, Test"));
        assert!(msg.contains("hand_sign_datasets"));
    }

    #[test]
    fn test_label_mismatch_display() {
        let err = HandSignError::LabelMismatch {
            index: 9,
            expected: "K".to_string(),
            found: "J".to_string(),
        };
        assert!(format!("{}", err).contains("index 9"));
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<i32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let with_context = result.context("Failed to read file");
        assert!(matches!(with_context, Err(HandSignError::InvalidInput(_))));
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.with_context(|| "Value was None".to_string());
        assert!(with_context.is_err());
    }
}
