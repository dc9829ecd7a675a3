//! Encoder settings shared by every worker

use serde::{Deserialize, Serialize};
use crate::error::{Result, HalfsizeError};
use crate::processing::resize::FilterType;

/// Quality used when nothing else is configured
pub const DEFAULT_QUALITY: u8 = 50;

/// How each image is resized and re-encoded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeSettings {
    /// Lossy quality (1-100), used by JPEG
    pub quality: u8,

    /// Resampling filter for the halving resize
    pub filter: FilterType,

    /// Spend more encoder time for smaller output where the format allows it
    pub optimize: bool,
}

impl TranscodeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output quality
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set resampling filter
    pub fn filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Enable or disable size optimization
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(HalfsizeError::invalid_configuration(format!(
                "Quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            filter: FilterType::default(),
            optimize: true,
        }
    }
}
