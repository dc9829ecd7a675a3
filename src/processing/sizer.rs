//! Folder size measurement

use std::path::Path;
use walkdir::WalkDir;

use crate::error::{HalfsizeError, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Sums the sizes of every regular file below a folder
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderSizer;

impl FolderSizer {
    pub fn new() -> Self {
        Self
    }

    /// Total bytes of all files under `path`, recursively
    pub fn size_bytes(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| {
                HalfsizeError::measurement(format!("Cannot walk directory: {}", e), path)
            })?;
            if entry.file_type().is_file() {
                let metadata = entry.metadata().map_err(|e| {
                    HalfsizeError::measurement(format!("Cannot read file metadata: {}", e), entry.path())
                })?;
                total += metadata.len();
            }
        }
        Ok(total)
    }

    /// Total size in binary megabytes, rounded to two decimals
    pub fn size_mb(&self, path: &Path) -> Result<f64> {
        Ok(bytes_to_mb(self.size_bytes(path)?))
    }
}

/// Convert bytes to MB (1024²), rounded to two decimals
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
