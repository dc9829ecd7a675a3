//! Input folder discovery

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ErrorContext, HalfsizeError, Result};
use crate::processing::ImageRef;

/// Lists the files directly inside an input folder
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderScanner;

impl FolderScanner {
    pub fn new() -> Self {
        Self
    }

    /// One [`ImageRef`] per regular file in `input_dir`, sorted by file name.
    ///
    /// Only subdirectories are skipped. Extensions are not checked: whether a
    /// file is an image is decided by the decoder, and files it cannot read
    /// end up as failures in the run report. Output paths point into
    /// `output_dir` under the same file name.
    pub fn scan(&self, input_dir: &Path, output_dir: &Path) -> Result<Vec<ImageRef>> {
        if !input_dir.is_dir() {
            return Err(HalfsizeError::invalid_configuration(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        let entries = fs::read_dir(input_dir)
            .with_path_context("Cannot list input directory", input_dir)?;

        let mut images = Vec::new();
        for entry in entries {
            let entry = entry.with_path_context("Cannot read input directory entry", input_dir)?;
            let path = entry.path();

            if !path.is_file() {
                debug!("Skipping non-file entry: {:?}", path);
                continue;
            }

            let file_name = entry.file_name();
            images.push(ImageRef::new(
                file_name.to_string_lossy().into_owned(),
                path,
                output_dir.join(&file_name),
            ));
        }

        // Sort files for consistent processing order
        images.sort_by(|a, b| a.name().cmp(b.name()));

        debug!("Found {} images in {:?}", images.len(), input_dir);
        Ok(images)
    }
}
