//! Hand-Sign Dataset Loader
//!
//! Scans a split directory laid out as `<split>/<class_label>/<image files>`.
//! Class indices follow the alphabetical order of the class folder names.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::utils::error::{HandSignError, Result};
use crate::utils::format_number;

/// Extensions picked up as images (compared lowercase)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image sample with its label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSample {
    pub path: PathBuf,
    /// Class index
    pub label: usize,
}

/// One split of the hand-sign dataset
#[derive(Debug, Clone)]
pub struct HandSignDataset {
    pub root_dir: PathBuf,
    pub samples: Vec<ImageSample>,
    /// Class folder names, sorted; index i is class i
    pub class_names: Vec<String>,
}

impl HandSignDataset {
    /// Scan a split directory
    ///
    /// ```text
    /// root_dir/
    /// ├── A/
    /// │   ├── 0001.jpg
    /// │   └── 0002.jpg
    /// ├── B/
    /// └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Scanning dataset split: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(HandSignError::PathNotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(HandSignError::Dataset(format!(
                "no class folders in {:?}",
                root_dir
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);
            // images in nested subfolders belong to the enclosing class
            let mut files: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_image_file(p))
                .collect();
            files.sort();

            debug!("Class '{}' (label {}): {} images", class_name, label, files.len());
            if files.is_empty() {
                warn!("Class folder {:?} contains no images", class_dir);
            }

            samples.extend(files.into_iter().map(|path| ImageSample { path, label }));
        }

        info!(
            "Found {} images in {} classes",
            samples.len(),
            class_names.len()
        );

        Ok(Self {
            root_dir,
            samples,
            class_names,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn get_stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            root_dir: self.root_dir.clone(),
            total_samples: self.samples.len(),
            class_names: self.class_names.clone(),
            class_counts,
        }
    }
}

/// Decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| HandSignError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| HandSignError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| HandSignError::ImageLoad(path.to_path_buf(), e.to_string()))
}

pub fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
}

/// Return `root/<candidate>` for the first candidate that is a directory.
///
/// Falling back past the first candidate is logged as a warning.
pub fn resolve_split_dir(root: &Path, candidates: &[String]) -> Result<PathBuf> {
    for (i, name) in candidates.iter().enumerate() {
        let dir = root.join(name);
        if dir.is_dir() {
            if i > 0 {
                warn!(
                    "Split directory '{}' not found under {:?}; using '{}'",
                    candidates[0], root, name
                );
            }
            return Ok(dir);
        }
    }

    Err(HandSignError::SplitNotFound {
        root: root.to_path_buf(),
        tried: candidates.to_vec(),
    })
}

/// Directory tree overview, one line per directory (used by `stats`)
pub fn list_directories(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    dirs.into_iter().collect()
}

/// Statistics about a dataset split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub root_dir: PathBuf,
    pub total_samples: usize,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\n📊 Dataset Statistics: {}", self.root_dir.display());
        println!("  Total samples: {}", format_number(self.total_samples));
        println!("  Number of classes: {}", self.class_names.len());
        println!("\n  Samples per class:");

        let max = self.class_counts.iter().copied().max().unwrap_or(0).max(1);
        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = (*count as f32 / max as f32 * 40.0) as usize;
            println!("    {:3}. {:10} {:6} {}", idx, name, count, "█".repeat(bar_len));
        }
    }
}
