//! Run entry point: scan, plan, dispatch, observe, measure

use std::fs;
use std::path::Path;
use std::thread;

use console::style;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, ExecutionMode};
use crate::error::{ErrorContext, HalfsizeError, Result};
use crate::parallel::{ChunkPlanner, PoolOutcome, ProgressCounter, ProgressReporter, WorkerPool};
use crate::processing::{FolderScanner, FolderSizer, ImageFormat, ImageTranscoder, TranscodeOutput};

/// One failed image in a [`RunReport`]
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub file: String,
    pub error: String,
}

/// One image written to the output folder
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedRecord {
    pub file: String,
    pub format: ImageFormat,
    pub original_dimensions: (u32, u32),
    pub output_dimensions: (u32, u32),
    pub output_bytes: u64,
    pub elapsed_secs: f64,
}

impl ProcessedRecord {
    fn new(file: &str, output: &TranscodeOutput) -> Self {
        Self {
            file: file.to_string(),
            format: output.format,
            original_dimensions: output.original_dimensions,
            output_dimensions: output.output_dimensions,
            output_bytes: output.output_size,
            elapsed_secs: output.processing_time.as_secs_f64(),
        }
    }
}

/// Summary of one execution mode over the input folder
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: ExecutionMode,
    pub workers: usize,
    pub total_images: usize,
    pub processed: usize,
    pub before_mb: f64,
    pub after_mb: f64,
    pub elapsed_secs: f64,
    /// Sorted by file name
    pub files: Vec<ProcessedRecord>,
    /// Sorted by file name
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    fn from_outcome(
        mode: ExecutionMode,
        workers: usize,
        total_images: usize,
        outcome: PoolOutcome<TranscodeOutput>,
        sizes: (f64, f64),
        elapsed_secs: f64,
    ) -> Self {
        let failures = outcome
            .failures
            .into_iter()
            .map(|failure| FailureRecord {
                file: failure.image.name().to_string(),
                error: failure.error.to_string(),
            })
            .collect();

        let files: Vec<ProcessedRecord> = outcome
            .completed
            .iter()
            .map(|(image, output)| ProcessedRecord::new(image.name(), output))
            .collect();

        Self {
            mode,
            workers,
            total_images,
            processed: files.len(),
            before_mb: sizes.0,
            after_mb: sizes.1,
            elapsed_secs: (elapsed_secs * 100.0).round() / 100.0,
            files,
            failures,
        }
    }

    /// Bytes written across all output files
    pub fn bytes_written(&self) -> u64 {
        self.files.iter().map(|file| file.output_bytes).sum()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("Before compression: {:.2} MB", self.before_mb);
        println!("After compression: {:.2} MB", self.after_mb);

        if !self.failures.is_empty() {
            println!(
                "{}: {} of {} images could not be processed",
                style("Failed").red().bold(),
                self.failed(),
                self.total_images
            );
            for failure in &self.failures {
                println!("  {}: {}", failure.file, failure.error);
            }
        }

        println!("Execution time of \"{}\": {:.2} s", self.mode, self.elapsed_secs);
    }
}

/// Wires scanner, planner, pool and reporter for a configured run
pub struct Orchestrator {
    config: Config,
    scanner: FolderScanner,
    transcoder: ImageTranscoder,
    sizer: FolderSizer,
}

impl Orchestrator {
    /// Fails with `InvalidConfiguration` when `config` does not validate
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transcoder: ImageTranscoder::new(config.transcode),
            scanner: FolderScanner::new(),
            sizer: FolderSizer::new(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every mode the configuration asks for, in order.
    ///
    /// Each mode deletes and recreates the output directory.
    pub fn run(&self) -> Result<Vec<RunReport>> {
        self.config
            .processing
            .mode
            .modes()
            .iter()
            .map(|&mode| self.run_mode(mode))
            .collect()
    }

    /// One pass over the input folder.
    ///
    /// Setup failures abort before any image is touched. Per-image failures
    /// are collected into the report.
    pub fn run_mode(&self, mode: ExecutionMode) -> Result<RunReport> {
        let reporter = ProgressReporter::start(&self.config.progress);
        let input_dir = self.config.paths.input_dir.as_path();
        let output_dir = self.config.paths.output_dir.as_path();

        info!("Starting {} run", mode);
        info!("Input: {:?}", input_dir);
        info!("Output: {:?}", output_dir);

        if !input_dir.is_dir() {
            return Err(HalfsizeError::invalid_configuration(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        prepare_output_dir(input_dir, output_dir)?;

        let images = self.scanner.scan(input_dir, output_dir)?;
        let before_mb = self.sizer.size_mb(input_dir)?;
        let total_images = images.len();

        let pool = match mode {
            ExecutionMode::Sequential => WorkerPool::sequential(),
            ExecutionMode::Parallel => WorkerPool::new(self.config.processing.effective_workers())?,
        };
        let chunks = ChunkPlanner::new(pool.workers())?.plan(images);

        info!(
            "Found {} images, {} chunks for {} workers",
            total_images,
            chunks.len(),
            pool.workers()
        );

        let counter = ProgressCounter::new();
        let outcome = thread::scope(|scope| {
            let worker = scope.spawn(|| {
                pool.run(&chunks, &counter, |image| self.transcoder.transcode(image))
            });
            reporter.observe(&counter, total_images);
            worker.join()
        })
        .map_err(|_| HalfsizeError::parallel("Worker pool thread panicked"))??;

        let after_mb = self.sizer.size_mb(output_dir)?;

        if !outcome.failures.is_empty() {
            warn!(
                "{} of {} images failed during {} run",
                outcome.failures.len(),
                total_images,
                mode
            );
        }

        let report = RunReport::from_outcome(
            mode,
            pool.workers(),
            total_images,
            outcome,
            (before_mb, after_mb),
            reporter.elapsed().as_secs_f64(),
        );

        info!(
            "{} run wrote {} files ({} bytes) in {:.2}s",
            mode,
            report.processed,
            report.bytes_written(),
            report.elapsed_secs
        );

        Ok(report)
    }
}

/// Delete `output_dir` if present and recreate it empty.
///
/// Destructive: everything under `output_dir` is removed. Refuses when the
/// output directory is, or contains, the input directory.
pub fn prepare_output_dir(input_dir: &Path, output_dir: &Path) -> Result<()> {
    let input = input_dir
        .canonicalize()
        .with_path_context("Cannot resolve input directory", input_dir)?;

    if output_dir.exists() {
        let output = output_dir
            .canonicalize()
            .with_path_context("Cannot resolve output directory", output_dir)?;

        if input.starts_with(&output) {
            return Err(HalfsizeError::invalid_configuration(format!(
                "Output directory {} must not be or contain the input directory",
                output_dir.display()
            )));
        }

        if !output.is_dir() {
            return Err(HalfsizeError::filesystem(
                "Output path exists and is not a directory",
                output_dir,
            ));
        }

        info!("Removing previous output directory {:?}", output_dir);
        fs::remove_dir_all(output_dir)
            .with_path_context("Cannot clear output directory", output_dir)?;
    }

    fs::create_dir_all(output_dir)
        .with_path_context("Cannot create output directory", output_dir)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProgressConfig, RunMode};
    use image::{GenericImageView, Rgb, RgbImage};
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, seed: u32) {
        RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ seed;
            Rgb([(v % 256) as u8, ((v >> 3) % 256) as u8, ((x + y + seed) % 256) as u8])
        })
        .save(path)
        .unwrap();
    }

    fn config_for(root: &TempDir, workers: usize, mode: RunMode) -> Config {
        let mut config = Config::default();
        config.paths.input_dir = root.path().join("images");
        config.paths.output_dir = root.path().join("compressed_images");
        config.processing.workers = Some(workers);
        config.processing.mode = mode;
        config.progress = ProgressConfig { enabled: false, poll_interval_ms: 10 };
        config
    }

    fn setup_images(root: &TempDir, count: u32, width: u32, height: u32) -> PathBuf {
        let input = root.path().join("images");
        fs::create_dir_all(&input).unwrap();
        for i in 0..count {
            write_png(&input.join(format!("image_{:02}.png", i)), width, height, i);
        }
        input
    }

    fn output_names(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_three_images_are_halved_and_shrink() {
        let root = TempDir::new().unwrap();
        setup_images(&root, 3, 800, 600);
        let config = config_for(&root, 4, RunMode::Parallel);
        let output_dir = config.paths.output_dir.clone();

        let report = Orchestrator::new(config).unwrap().run_mode(ExecutionMode::Parallel).unwrap();

        assert_eq!(report.total_images, 3);
        assert_eq!(report.processed, 3);
        assert!(report.failures.is_empty());
        assert!(report.after_mb < report.before_mb);

        let names = output_names(&output_dir);
        assert_eq!(names.len(), 3);
        for name in names {
            let image = image::open(output_dir.join(&name)).unwrap();
            assert_eq!(image.dimensions(), (400, 300));
        }
    }

    #[test]
    fn test_one_worker_matches_eight_workers() {
        let root = TempDir::new().unwrap();
        setup_images(&root, 20, 64, 50);

        let sequential = Orchestrator::new(config_for(&root, 1, RunMode::Sequential)).unwrap();
        let report = sequential.run_mode(ExecutionMode::Sequential).unwrap();
        assert_eq!(report.workers, 1);
        let output_dir = sequential.config().paths.output_dir.clone();
        let first: Vec<_> = output_names(&output_dir)
            .into_iter()
            .map(|name| (name.clone(), fs::read(output_dir.join(&name)).unwrap()))
            .collect();

        let parallel = Orchestrator::new(config_for(&root, 8, RunMode::Parallel)).unwrap();
        let report = parallel.run_mode(ExecutionMode::Parallel).unwrap();
        assert_eq!(report.workers, 8);
        assert_eq!(report.processed, 20);

        let second: Vec<_> = output_names(&output_dir)
            .into_iter()
            .map(|name| (name.clone(), fs::read(output_dir.join(&name)).unwrap()))
            .collect();

        assert_eq!(first.len(), 20);
        assert_eq!(first, second);
        for (name, _) in &second {
            assert_eq!(image::image_dimensions(output_dir.join(name)).unwrap(), (32, 25));
        }
    }

    #[test]
    fn test_empty_input() {
        let root = TempDir::new().unwrap();
        setup_images(&root, 0, 1, 1);

        let reports = Orchestrator::new(config_for(&root, 4, RunMode::Both)).unwrap().run().unwrap();

        assert_eq!(reports.len(), 2);
        for report in reports {
            assert_eq!(report.total_images, 0);
            assert_eq!(report.before_mb, 0.0);
            assert_eq!(report.after_mb, 0.0);
        }
    }

    #[test]
    fn test_corrupt_file_among_ten() {
        let root = TempDir::new().unwrap();
        let input = setup_images(&root, 9, 40, 30);
        fs::write(input.join("broken.png"), b"not really a png").unwrap();
        let config = config_for(&root, 4, RunMode::Parallel);
        let output_dir = config.paths.output_dir.clone();

        let report = Orchestrator::new(config).unwrap().run_mode(ExecutionMode::Parallel).unwrap();

        assert_eq!(report.total_images, 10);
        assert_eq!(report.processed, 9);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].file, "broken.png");

        let names = output_names(&output_dir);
        assert_eq!(names.len(), 9);
        assert!(!names.contains("broken.png"));
    }

    #[test]
    fn test_rerun_recreates_output() {
        let root = TempDir::new().unwrap();
        setup_images(&root, 4, 20, 20);
        let orchestrator = Orchestrator::new(config_for(&root, 2, RunMode::Parallel)).unwrap();
        let output_dir = orchestrator.config().paths.output_dir.clone();

        orchestrator.run().unwrap();
        let first = output_names(&output_dir);
        fs::write(output_dir.join("stale.txt"), b"left over").unwrap();

        orchestrator.run().unwrap();
        assert_eq!(output_names(&output_dir), first);
    }

    #[test]
    fn test_missing_input_directory() {
        let root = TempDir::new().unwrap();
        let err = Orchestrator::new(config_for(&root, 2, RunMode::Parallel))
            .unwrap()
            .run_mode(ExecutionMode::Parallel)
            .unwrap_err();

        assert!(matches!(err, HalfsizeError::InvalidConfiguration { .. }));
        assert!(!root.path().join("compressed_images").exists());
    }

    #[test]
    fn test_output_must_not_contain_input() {
        let root = TempDir::new().unwrap();
        let input = setup_images(&root, 1, 10, 10);

        let err = prepare_output_dir(&input, root.path()).unwrap_err();
        assert!(matches!(err, HalfsizeError::InvalidConfiguration { .. }));
        let err = prepare_output_dir(&input, &input).unwrap_err();
        assert!(matches!(err, HalfsizeError::InvalidConfiguration { .. }));
        assert!(input.join("image_00.png").exists());
    }

    #[test]
    fn test_output_path_is_a_file() {
        let root = TempDir::new().unwrap();
        let input = setup_images(&root, 1, 10, 10);
        let output = root.path().join("output.txt");
        fs::write(&output, b"keep me").unwrap();

        let err = prepare_output_dir(&input, &output).unwrap_err();
        assert!(matches!(err, HalfsizeError::Filesystem { .. }));
        assert_eq!(fs::read(&output).unwrap(), b"keep me");
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let root = TempDir::new().unwrap();
        let mut config = config_for(&root, 2, RunMode::Parallel);
        config.processing.workers = Some(0);
        assert!(Orchestrator::new(config).is_err());
    }

    #[test]
    fn test_files_are_picked_by_content_not_extension() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("images");
        fs::create_dir_all(&input).unwrap();
        write_png(&input.join("photo.png"), 40, 30, 1);
        fs::rename(input.join("photo.png"), input.join("photo")).unwrap();
        write_png(&input.join("ok.png"), 40, 30, 2);
        fs::write(input.join("notes.txt"), b"meeting notes").unwrap();
        let config = config_for(&root, 4, RunMode::Parallel);
        let output_dir = config.paths.output_dir.clone();

        let report = Orchestrator::new(config).unwrap().run_mode(ExecutionMode::Parallel).unwrap();

        assert_eq!(report.total_images, 3);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].file, "notes.txt");

        let names: Vec<_> = output_names(&output_dir).into_iter().collect();
        assert_eq!(names, vec!["ok.png", "photo"]);
        let photo = image::io::Reader::open(output_dir.join("photo"))
            .unwrap()
            .with_guessed_format()
            .unwrap();
        assert_eq!(photo.format(), Some(image::ImageFormat::Png));
        assert_eq!(photo.into_dimensions().unwrap(), (20, 15));
    }

    #[test]
    fn test_report_lists_are_sorted_by_name() {
        let root = TempDir::new().unwrap();
        let input = setup_images(&root, 6, 24, 24);
        for name in ["z_bad.png", "m_bad.png", "a_bad.png"] {
            fs::write(input.join(name), b"corrupt").unwrap();
        }

        let report = Orchestrator::new(config_for(&root, 4, RunMode::Parallel))
            .unwrap()
            .run_mode(ExecutionMode::Parallel)
            .unwrap();

        let failed: Vec<_> = report.failures.iter().map(|failure| failure.file.as_str()).collect();
        assert_eq!(failed, vec!["a_bad.png", "m_bad.png", "z_bad.png"]);

        let processed: Vec<_> = report.files.iter().map(|file| file.file.clone()).collect();
        let mut sorted = processed.clone();
        sorted.sort();
        assert_eq!(processed, sorted);
        assert_eq!(processed.len(), 6);
    }

    #[test]
    fn test_report_carries_per_file_output() {
        let root = TempDir::new().unwrap();
        setup_images(&root, 2, 50, 40);
        let config = config_for(&root, 2, RunMode::Parallel);
        let output_dir = config.paths.output_dir.clone();

        let report = Orchestrator::new(config).unwrap().run_mode(ExecutionMode::Parallel).unwrap();

        assert_eq!(report.files.len(), 2);
        for file in &report.files {
            assert_eq!(file.format, ImageFormat::Png);
            assert_eq!(file.original_dimensions, (50, 40));
            assert_eq!(file.output_dimensions, (25, 20));
            assert_eq!(file.output_bytes, fs::metadata(output_dir.join(&file.file)).unwrap().len());
        }
        assert_eq!(report.bytes_written(), FolderSizer::new().size_bytes(&output_dir).unwrap());
    }
}
