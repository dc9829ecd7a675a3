//! Configuration management for halfsize

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, HalfsizeError};

pub mod transcode;
pub use transcode::*;

/// Shortest allowed progress poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output folders
    pub paths: PathsConfig,

    /// Worker count and run mode
    pub processing: ProcessingConfig,

    /// Encoder settings
    pub transcode: TranscodeSettings,

    /// Progress display
    pub progress: ProgressConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Input and output folders
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder scanned for images
    pub input_dir: PathBuf,

    /// Folder recreated on every run. Its previous content is deleted.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./images"),
            output_dir: PathBuf::from("./compressed_images"),
        }
    }
}

/// Global processing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of worker threads (None = logical CPU count)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Which execution modes a run performs
    pub mode: RunMode,
}

impl ProcessingConfig {
    /// Worker count with the CPU-count fallback applied
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }
}

/// Progress display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Draw a progress bar
    pub enabled: bool,

    /// How often the reporter reads the shared counter
    pub poll_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

/// Which execution modes a run performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Sequential,
    Parallel,
    /// Sequential first, then parallel, into the same output folder
    #[default]
    Both,
}

impl RunMode {
    /// Execution modes in the order they run
    pub fn modes(self) -> &'static [ExecutionMode] {
        match self {
            Self::Sequential => &[ExecutionMode::Sequential],
            Self::Parallel => &[ExecutionMode::Parallel],
            Self::Both => &[ExecutionMode::Sequential, ExecutionMode::Parallel],
        }
    }
}

/// A single pass over the input folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One worker, one chunk holding every image, no thread pool
    Sequential,
    /// Configured worker count on a thread pool
    Parallel,
}

impl ExecutionMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| HalfsizeError::config(
                format!("Failed to read config file {:?}: {}", path.as_ref(), e)
            ))?;

        let extension = path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension.to_lowercase().as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(HalfsizeError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let extension = path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let content = match extension.to_lowercase().as_str() {
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| HalfsizeError::config(format!("TOML serialization failed: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map_err(|e| HalfsizeError::config(format!("YAML serialization failed: {}", e)))?,
            _ => return Err(HalfsizeError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        };

        std::fs::write(&path, content)
            .map_err(|e| HalfsizeError::config(
                format!("Failed to write config file {:?}: {}", path.as_ref(), e)
            ))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.processing.workers {
            if workers == 0 {
                return Err(HalfsizeError::invalid_configuration(
                    "Worker count must be greater than 0"
                ));
            }
        }

        if self.progress.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(HalfsizeError::invalid_configuration(format!(
                "Progress poll interval must be at least {}ms",
                MIN_POLL_INTERVAL_MS
            )));
        }

        if self.paths.input_dir.as_os_str().is_empty() || self.paths.output_dir.as_os_str().is_empty() {
            return Err(HalfsizeError::invalid_configuration(
                "Input and output directories must not be empty"
            ));
        }

        self.transcode.validate()?;

        Ok(())
    }
}
