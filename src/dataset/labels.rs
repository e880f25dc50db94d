//! Class label table
//!
//! Maps class indices to display letters. Class indices come from the sorted
//! folder names of the training split, so the table is checked against those
//! folders before it is trusted.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LabelConfig;
use crate::utils::error::{HandSignError, Result};

/// Static ASL letters: A through Y without the motion letter J
pub const DEFAULT_LABELS: [&str; crate::NUM_CLASSES] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T",
    "U", "V", "W", "X", "Y",
];

/// Ordered list of display labels, index i naming class i
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label for a class index
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Check that entry i equals discovered folder i for every i.
    ///
    /// The first disagreement is reported; a length difference shows up as
    /// `<none>` on the shorter side.
    pub fn validate_against(&self, discovered: &[String]) -> Result<()> {
        let n = self.labels.len().max(discovered.len());
        for index in 0..n {
            let expected = self.labels.get(index).map(String::as_str);
            let found = discovered.get(index).map(String::as_str);
            if expected != found {
                return Err(HandSignError::LabelMismatch {
                    index,
                    expected: expected.unwrap_or("<none>").to_string(),
                    found: found.unwrap_or("<none>").to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build the table a run should use.
    ///
    /// Strict configs fail on any disagreement with the discovered folders;
    /// lenient configs log it and fall back to the folder names.
    pub fn resolve(config: &LabelConfig, discovered: &[String]) -> Result<Self> {
        let table = Self::new(config.table.clone());
        match table.validate_against(discovered) {
            Ok(()) => Ok(table),
            Err(err) if !config.strict => {
                warn!("{}; using folder names as labels", err);
                Ok(Self::new(discovered.to_vec()))
            }
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.labels)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HandSignError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_table() {
        let table = LabelTable::default();
        assert_eq!(table.len(), 24);
        assert_eq!(table.label(0), Some("A"));
        assert_eq!(table.label(9), Some("K"));
        assert_eq!(table.label(23), Some("Y"));
        assert!(!table.labels().iter().any(|l| l == "J"));
        assert_eq!(table.label(24), None);
    }

    #[test]
    fn test_validate_matching_order() {
        let table = LabelTable::new(names(&["A", "B", "C"]));
        assert!(table.validate_against(&names(&["A", "B", "C"])).is_ok());
    }

    #[test]
    fn test_validate_reports_first_mismatch() {
        let table = LabelTable::new(names(&["A", "B", "C"]));
        let err = table
            .validate_against(&names(&["A", "C", "B"]))
            .unwrap_err();
        match err {
            HandSignError::LabelMismatch {
                index,
                expected,
                found,
            } => {
                assert_eq!(index, 1);
                assert_eq!(expected, "B");
                assert_eq!(found, "C");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_length_difference() {
        let table = LabelTable::new(names(&["A", "B"]));
        let err = table.validate_against(&names(&["A"])).unwrap_err();
        assert!(format!("{}", err).contains("<none>"));
    }

    #[test]
    fn test_resolve_strict_fails() {
        let config = LabelConfig {
            table: names(&["A", "B"]),
            strict: true,
        };
        assert!(LabelTable::resolve(&config, &names(&["0", "1"])).is_err());
    }

    #[test]
    fn test_resolve_lenient_uses_folders() {
        let config = LabelConfig {
            table: names(&["A", "B"]),
            strict: false,
        };
        let table = LabelTable::resolve(&config, &names(&["0", "1"])).unwrap();
        assert_eq!(table.labels(), &names(&["0", "1"])[..]);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        let table = LabelTable::default();
        table.save(&path).unwrap();
        assert_eq!(LabelTable::load(&path).unwrap(), table);
    }
}
