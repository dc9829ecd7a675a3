//! Error types and handling for halfsize

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for halfsize operations
pub type Result<T> = std::result::Result<T, HalfsizeError>;

/// Main error type for halfsize operations
#[derive(Debug, Error)]
pub enum HalfsizeError {
    /// Bad worker count, quality, missing input directory and similar
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Output directory could not be prepared, or the input directory could not be listed
    #[error("Filesystem error: {message} (path: {path:?})")]
    Filesystem { message: String, path: PathBuf },

    /// A folder size could not be measured
    #[error("Measurement error: {message} (path: {path:?})")]
    Measurement { message: String, path: PathBuf },

    /// Configuration file errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// Thread pool errors
    #[error("Parallel processing error: {message}")]
    ParallelError { message: String },
}

/// Failure of one image inside a worker. Never crosses file boundaries and
/// never aborts a run; it ends up in the run report instead.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {path:?} is too small to halve ({width}x{height})")]
    TooSmall { path: PathBuf, width: u32, height: u32 },

    #[error("failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker panicked while transcoding {path:?}: {message}")]
    Panicked { path: PathBuf, message: String },
}

impl TranscodeError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl HalfsizeError {
    /// Create a new invalid configuration error
    pub fn invalid_configuration<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a new filesystem error
    pub fn filesystem<S: Into<String>>(message: S, path: &Path) -> Self {
        Self::Filesystem {
            message: message.into(),
            path: path.to_path_buf(),
        }
    }

    /// Create a new folder measurement error
    pub fn measurement<S: Into<String>>(message: S, path: &Path) -> Self {
        Self::Measurement {
            message: message.into(),
            path: path.to_path_buf(),
        }
    }

    /// Create a new configuration file error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new parallel processing error
    pub fn parallel<S: Into<String>>(message: S) -> Self {
        Self::ParallelError {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidConfiguration { message } => {
                format!("{}. Run with --help for usage information", message)
            }
            Self::Filesystem { message, path } => {
                format!("{} ({}). No images were processed", message, path.display())
            }
            Self::Measurement { message, path } => {
                format!("Could not measure folder size: {} ({})", message, path.display())
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for HalfsizeError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for HalfsizeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

/// Error context extension for turning I/O failures into filesystem errors
pub trait ErrorContext<T> {
    /// Attach a message and path to an I/O error
    fn with_path_context<S: Into<String>>(self, message: S, path: &Path) -> Result<T>;
}

impl<T> ErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn with_path_context<S: Into<String>>(self, message: S, path: &Path) -> Result<T> {
        self.map_err(|e| HalfsizeError::filesystem(format!("{}: {}", message.into(), e), path))
    }
}
