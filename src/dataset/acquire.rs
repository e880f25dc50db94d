//! Dataset acquisition
//!
//! Fetches the dataset archive and unpacks it, unless the expected dataset
//! directory is already on disk. There is no retry and no checksum check.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::DatasetConfig;
use crate::utils::error::{HandSignError, Result};

/// What [`ensure_dataset`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Dataset directory existed; nothing was fetched
    AlreadyPresent(PathBuf),
    /// Archive was downloaded and extracted
    Downloaded(PathBuf),
}

impl AcquireOutcome {
    pub fn dataset_dir(&self) -> &Path {
        match self {
            AcquireOutcome::AlreadyPresent(p) | AcquireOutcome::Downloaded(p) => p,
        }
    }
}

/// Supported archive formats, chosen from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    SevenZip,
    TarGz,
}

impl ArchiveFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".7z") {
            Ok(ArchiveFormat::SevenZip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else {
            Err(HandSignError::UnsupportedArchive(path.to_path_buf()))
        }
    }
}

/// Make sure the dataset directory exists, downloading it if needed
pub fn ensure_dataset(config: &DatasetConfig) -> Result<AcquireOutcome> {
    let dataset_dir = config.dataset_dir();
    if dataset_dir.is_dir() {
        info!("Dataset directory {:?} already exists, skipping download", dataset_dir);
        return Ok(AcquireOutcome::AlreadyPresent(dataset_dir));
    }

    let archive_path = config.archive_path();
    // fail before touching the network when we could not unpack the result
    ArchiveFormat::from_path(&archive_path)?;

    if archive_path.exists() {
        warn!("Removing stale archive {:?}", archive_path);
        fs::remove_file(&archive_path)?;
    }

    download(&config.url, &archive_path)?;
    extract_archive(&archive_path, &config.extract_root)?;

    if !dataset_dir.is_dir() {
        return Err(HandSignError::Dataset(format!(
            "archive {:?} did not contain {:?}",
            archive_path, dataset_dir
        )));
    }

    if config.remove_archive {
        fs::remove_file(&archive_path)?;
    }

    info!("Dataset ready at {:?}", dataset_dir);
    Ok(AcquireOutcome::Downloaded(dataset_dir))
}

/// Stream `url` into `dest`
pub fn download(url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    info!("Downloading {} -> {:?}", url, dest);
    let download_err = |reason: String| HandSignError::Download {
        url: url.to_string(),
        reason,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| download_err(e.to_string()))?;

    let mut writer = BufWriter::new(File::create(dest)?);
    let bytes = response
        .copy_to(&mut writer)
        .map_err(|e| download_err(e.to_string()))?;

    info!("Downloaded {:.1} MB", bytes as f64 / 1_048_576.0);
    Ok(bytes)
}

/// Unpack an archive into `output_dir`
pub fn extract_archive(archive: &Path, output_dir: &Path) -> Result<()> {
    let format = ArchiveFormat::from_path(archive)?;
    fs::create_dir_all(output_dir)?;
    info!("Extracting {:?} into {:?}", archive, output_dir);

    match format {
        ArchiveFormat::SevenZip => sevenz_rust::decompress_file(archive, output_dir)
            .map_err(|e| HandSignError::Extraction(archive.to_path_buf(), e.to_string())),
        ArchiveFormat::TarGz => {
            let decoder = flate2::read::GzDecoder::new(File::open(archive)?);
            tar::Archive::new(decoder)
                .unpack(output_dir)
                .map_err(|e| HandSignError::Extraction(archive.to_path_buf(), e.to_string()))
        }
    }
}
