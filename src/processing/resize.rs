//! Halving resize

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::TranscodeError;

/// Available resize filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterType {
    /// Nearest neighbor (fastest, lowest quality)
    Nearest,
    /// Triangle (linear interpolation)
    Triangle,
    /// Catmull-Rom cubic spline
    #[default]
    CatmullRom,
    /// Gaussian blur
    Gaussian,
    /// Lanczos with radius 3
    Lanczos3,
}

impl From<FilterType> for image::imageops::FilterType {
    fn from(filter: FilterType) -> Self {
        match filter {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Triangle => image::imageops::FilterType::Triangle,
            FilterType::CatmullRom => image::imageops::FilterType::CatmullRom,
            FilterType::Gaussian => image::imageops::FilterType::Gaussian,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Target size for a halving resize, `None` when either side would be zero
pub fn half_dimensions(width: u32, height: u32) -> Option<(u32, u32)> {
    let (half_width, half_height) = (width / 2, height / 2);
    if half_width == 0 || half_height == 0 {
        None
    } else {
        Some((half_width, half_height))
    }
}

/// Resizes images to exactly half their width and height (floor division)
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfResizer {
    filter: FilterType,
}

impl HalfResizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Resize `image`, read from `path`. The path is only used for error reporting.
    pub fn resize(&self, image: &DynamicImage, path: &Path) -> Result<DynamicImage, TranscodeError> {
        let (width, height) = (image.width(), image.height());
        let (target_width, target_height) = half_dimensions(width, height)
            .ok_or_else(|| TranscodeError::TooSmall {
                path: path.to_path_buf(),
                width,
                height,
            })?;

        debug!(
            "Resizing {}x{} -> {}x{} using {:?}",
            width, height, target_width, target_height, self.filter
        );

        // resize_exact: aspect-preserving resize may round a side up by one
        Ok(image.resize_exact(target_width, target_height, self.filter.into()))
    }
}
