//! halfsize - parallel batch image shrinker
//!
//! Halves the width and height of every image in a folder, re-encodes it at a
//! reduced quality and reports the folder size before and after.
//!
//! The interesting part is the work distribution: the file list is split into
//! at most one contiguous chunk per worker, each chunk runs on its own thread
//! of a fixed-size pool, and a shared atomic counter feeds the progress bar.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use halfsize::{Config, ExecutionMode, Orchestrator};
//!
//! let mut config = Config::default();
//! config.paths.input_dir = "./images".into();
//! config.paths.output_dir = "./compressed_images".into();
//! config.processing.workers = Some(8);
//!
//! let orchestrator = Orchestrator::new(config)?;
//! let report = orchestrator.run_mode(ExecutionMode::Parallel)?;
//! report.print_summary();
//! # Ok::<(), halfsize::HalfsizeError>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{Config, ExecutionMode, LoggingConfig, RunMode, TranscodeSettings};
pub use error::{HalfsizeError, Result, TranscodeError};
pub use orchestrator::{Orchestrator, RunReport};
pub use parallel::{ChunkPlanner, ProgressCounter, ProgressReporter, WorkerPool};
pub use processing::{FolderScanner, FolderSizer, ImageRef, ImageTranscoder};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with default settings (`RUST_LOG`, else warnings only)
pub fn init() -> Result<()> {
    init_with_config(&LoggingConfig::default())
}

/// Initialize logging from configuration.
///
/// Logs go to stderr so stdout only carries the report. Calling this more
/// than once is harmless; the first subscriber stays installed.
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| HalfsizeError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json_format {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };

    if installed {
        info!("halfsize v{} initialized", VERSION);
    }

    Ok(())
}

/// Warn when more workers are requested than the machine has CPUs
pub fn check_worker_count(workers: usize) {
    use sysinfo::{System, SystemExt};

    let mut system = System::new();
    system.refresh_cpu();

    let logical = num_cpus::get();
    let physical = system.physical_core_count().unwrap_or(logical);
    info!("Detected {} logical CPUs ({} physical cores)", logical, physical);

    if workers > logical {
        warn!(
            "{} workers requested but only {} logical CPUs are available",
            workers, logical
        );
    }
}
