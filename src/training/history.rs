//! Per-epoch training metrics

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{HandSignError, Result};

/// Metrics of one finished epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Append-only record of epoch metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    /// Append the next epoch; its number is assigned here
    pub fn record(&mut self, loss: f64, accuracy: f64, val_loss: f64, val_accuracy: f64) -> EpochMetrics {
        let metrics = EpochMetrics {
            epoch: self.epochs.len() + 1,
            loss,
            accuracy,
            val_loss,
            val_accuracy,
        };
        self.epochs.push(metrics);
        metrics
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.loss).collect()
    }

    pub fn accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.accuracy).collect()
    }

    pub fn val_loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_loss).collect()
    }

    pub fn val_accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_accuracy).collect()
    }

    /// Epoch with the highest validation accuracy
    pub fn best_epoch(&self) -> Option<&EpochMetrics> {
        self.epochs
            .iter()
            .max_by(|a, b| a.val_accuracy.total_cmp(&b.val_accuracy))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HandSignError::PathNotFound(path.to_path_buf()));
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_numbers_epochs() {
        let mut history = TrainingHistory::default();
        history.record(2.0, 0.1, 2.1, 0.08);
        let second = history.record(1.5, 0.3, 1.7, 0.25);

        assert_eq!(second.epoch, 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.loss(), vec![2.0, 1.5]);
        assert_eq!(history.val_accuracy(), vec![0.08, 0.25]);
    }

    #[test]
    fn test_best_epoch() {
        let mut history = TrainingHistory::default();
        history.record(2.0, 0.1, 2.1, 0.30);
        history.record(1.5, 0.3, 1.7, 0.60);
        history.record(1.2, 0.5, 1.9, 0.55);
        assert_eq!(history.best_epoch().map(|m| m.epoch), Some(2));
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut history = TrainingHistory::default();
        history.record(2.0, 0.1, 2.1, 0.08);

        history.save(&path).unwrap();
        assert_eq!(TrainingHistory::load(&path).unwrap(), history);
    }
}
