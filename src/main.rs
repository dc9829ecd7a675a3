//! halfsize CLI - halves every image in a folder, in parallel
//!
//! Reads `./images`, writes `./compressed_images` and reports the folder size
//! before and after, once per execution mode.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde::Serialize;
use tracing::debug;

use halfsize::processing::resize::FilterType;
use halfsize::{
    check_worker_count, init_with_config, Config, HalfsizeError, Orchestrator, RunMode, RunReport,
};

/// Exit code when --strict is set and at least one image failed
const EXIT_PARTIAL_FAILURE: i32 = 2;

/// halfsize - parallel batch image shrinker
#[derive(Parser)]
#[command(
    name = "halfsize",
    version,
    about = "Halve the dimensions of every image in a folder and re-encode it",
    long_about = "halfsize resizes every image in the input folder to half its width and height, \
                  re-encodes it at reduced quality and reports the folder size before and after. \
                  The output folder is DELETED and recreated on every run."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input directory [default: ./images]
    #[arg(short, long, value_name = "DIR")]
    input: Option<PathBuf>,

    /// Output directory, deleted and recreated on every run [default: ./compressed_images]
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of worker threads [default: logical CPU count]
    #[arg(short, long, value_name = "COUNT", env = "HALFSIZE_WORKERS")]
    workers: Option<usize>,

    /// Execution mode [default: both]
    #[arg(short, long, value_enum)]
    mode: Option<CliMode>,

    /// JPEG output quality (1-100) [default: 50]
    #[arg(short, long, value_name = "QUALITY")]
    quality: Option<u8>,

    /// Resampling filter for the halving resize [default: catmull-rom]
    #[arg(long, value_enum)]
    filter: Option<CliFilter>,

    /// Configuration file path (.toml or .yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the run reports as JSON
    #[arg(long)]
    json: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,

    /// Exit with status 2 when any image failed
    #[arg(long)]
    strict: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path
        #[arg(short, long, default_value = "halfsize.toml")]
        output: PathBuf,
        /// Use YAML format instead of TOML
        #[arg(long)]
        yaml: bool,
    },
    /// Validate configuration file
    Config {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Show system information
    Info,
}

/// CLI-compatible execution mode enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    Sequential,
    Parallel,
    Both,
}

impl From<CliMode> for RunMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Sequential => RunMode::Sequential,
            CliMode::Parallel => RunMode::Parallel,
            CliMode::Both => RunMode::Both,
        }
    }
}

/// CLI-compatible filter enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<CliFilter> for FilterType {
    fn from(filter: CliFilter) -> Self {
        match filter {
            CliFilter::Nearest => FilterType::Nearest,
            CliFilter::Triangle => FilterType::Triangle,
            CliFilter::CatmullRom => FilterType::CatmullRom,
            CliFilter::Gaussian => FilterType::Gaussian,
            CliFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = &cli.command {
        if let Err(e) = handle_subcommand(command) {
            eprintln!("{}: {:#}", style("Error").red().bold(), e);
            process::exit(1);
        }
        return;
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = init_with_config(&config.logging) {
        exit_with(&e);
    }
    debug!("Effective configuration: {:?}", config);

    check_worker_count(config.processing.effective_workers());

    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => exit_with(&e),
    };

    let reports = match orchestrator.run() {
        Ok(reports) => reports,
        Err(e) => exit_with(&e),
    };

    if cli.json {
        print_json(orchestrator.config(), &reports);
    } else {
        for (index, report) in reports.iter().enumerate() {
            if index > 0 {
                println!();
            }
            report.print_summary();
        }
    }

    if cli.strict && reports.iter().any(|report| report.failed() > 0) {
        process::exit(EXIT_PARTIAL_FAILURE);
    }
}

fn exit_with(error: &HalfsizeError) -> ! {
    eprintln!("{}: {}", style("Error").red().bold(), error.user_message());
    process::exit(1);
}

/// Defaults, then the config file, then command-line flags
fn build_config(cli: &Cli) -> halfsize::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(input) = &cli.input {
        config.paths.input_dir = input.clone();
    }
    if let Some(output) = &cli.output {
        config.paths.output_dir = output.clone();
    }
    if let Some(workers) = cli.workers {
        config.processing.workers = Some(workers);
    }
    if let Some(mode) = cli.mode {
        config.processing.mode = mode.into();
    }
    if let Some(quality) = cli.quality {
        config.transcode = config.transcode.quality(quality);
    }
    if let Some(filter) = cli.filter {
        config.transcode = config.transcode.filter(filter.into());
    }

    if cli.json || cli.quiet || cli.no_progress {
        config.progress.enabled = false;
    }

    if cli.verbose {
        config.logging.level = "debug".to_string();
    } else if cli.quiet {
        config.logging.level = "error".to_string();
    }

    config.validate()?;
    Ok(config)
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    version: &'static str,
    input_dir: &'a Path,
    output_dir: &'a Path,
    runs: &'a [RunReport],
}

fn print_json(config: &Config, reports: &[RunReport]) {
    let summary = JsonSummary {
        version: halfsize::VERSION,
        input_dir: &config.paths.input_dir,
        output_dir: &config.paths.output_dir,
        runs: reports,
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("{}: Failed to serialize report: {}", style("Error").red().bold(), e);
            process::exit(1);
        }
    }
}

/// Handle subcommands
fn handle_subcommand(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::ExampleConfig { output, yaml } => generate_example_config(output, *yaml),
        Commands::Config { file } => validate_config_file(file),
        Commands::Info => {
            show_system_info();
            Ok(())
        }
    }
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path, use_yaml: bool) -> anyhow::Result<()> {
    let output_path = if use_yaml {
        output_path.with_extension("yaml")
    } else {
        output_path.to_path_buf()
    };

    Config::default()
        .to_file(&output_path)
        .with_context(|| format!("Cannot write {}", output_path.display()))?;

    let format = if use_yaml { "YAML" } else { "TOML" };
    println!(
        "{}: Generated example {} configuration: {}",
        style("Success").green().bold(),
        format,
        output_path.display()
    );

    Ok(())
}

/// Validate configuration file
fn validate_config_file(file_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(file_path)?;
    config.validate()?;

    println!("{}: Configuration file is valid", style("Success").green().bold());
    println!("Input: {}", config.paths.input_dir.display());
    println!("Output: {}", config.paths.output_dir.display());
    println!("Workers: {}", config.processing.effective_workers());
    println!("Mode: {:?}", config.processing.mode);
    println!("Quality: {}", config.transcode.quality);

    Ok(())
}

/// Show system information
fn show_system_info() {
    use sysinfo::{CpuExt, System, SystemExt};

    println!("{}", style("halfsize System Information").bold());
    println!();
    println!("{}: {}", style("Version").bold(), halfsize::VERSION);
    println!();

    let mut system = System::new_all();
    system.refresh_all();

    println!("{}", style("System:").bold());
    if let Some(name) = system.name() {
        println!("  OS: {}", name);
    }
    if let Some(version) = system.os_version() {
        println!("  Version: {}", version);
    }
    println!("  Logical CPUs: {} (default worker count)", num_cpus::get());
    if let Some(physical) = system.physical_core_count() {
        println!("  Physical cores: {}", physical);
    }
    if let Some(cpu) = system.cpus().first() {
        println!("  CPU: {} ({:.2} GHz)", cpu.brand(), cpu.frequency() as f64 / 1000.0);
    }
    println!("  Memory: {:.2} GB total, {:.2} GB available",
             system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
             system.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0);
    println!();

    println!("{}", style("Supported Formats:").bold());
    println!("  Input: {}", halfsize::processing::supported_input_formats().join(", "));
}
