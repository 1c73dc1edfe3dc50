//! StaffStats - grouped descriptive statistics over staff records
//!
//! A CLI tool that loads departments, an age lookup and employee records
//! from a directory, groups employees by department and by age range, and
//! writes median, percentile and average reports as CSV.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, missing input, unreadable config, etc.)
//!   2 - At least one report could not be written

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;
mod scanner;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("StaffStats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .staffstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load, aggregate and report. Returns the exit code (0 or 2).
fn run(args: &Args) -> Result<i32> {
    let start_time = Instant::now();
    let input_dir = args.input_dir();
    let output_dir = args.output_dir();

    let mut config = load_config(args)?;
    config.merge_with_args(args);

    // Step 1: find the input files
    let scanner = scanner::InputScanner::new(input_dir.to_path_buf(), config.input.clone());
    info!("Reading input from {}", scanner.input_dir().display());
    let files = scanner.scan()?;

    // Step 2: load everything into the index
    let (index, load_report) = ingest::load(&files, config.general.workers)?;
    debug!("Load report: {:?}", load_report);

    if args.dry_run {
        info!(
            "Dry run: {} departments, {} employees; no reports written",
            index.unit_count(),
            index.member_count()
        );
        return Ok(0);
    }

    // Step 3: write the reports
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let outcomes = report::generate_reports(&index, output_dir, &config.output);
    let mut failures = 0;
    for outcome in outcomes.iter().filter(|outcome| !outcome.is_ok()) {
        warn!("{} was not written to {}", outcome.kind, outcome.path.display());
        failures += 1;
    }

    if let Some(ref summary_json) = config.output.summary_json {
        let path = output_dir.join(summary_json);
        match report::write_summary_json(&index, &path) {
            Ok(()) => info!("Wrote summary JSON to {}", path.display()),
            Err(e) => {
                error!("Failed to write summary JSON: {:#}", e);
                failures += 1;
            }
        }
    }

    info!(
        "Application completed in {}",
        format_elapsed(start_time.elapsed())
    );

    if failures > 0 {
        warn!("{} report(s) could not be written", failures);
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Then the input directory, then the current directory
    let found = Config::load_from_dir(args.input_dir()).and_then(|config| match config {
        Some(config) => Ok(Some(config)),
        None => Config::load_default(),
    });

    match found {
        Ok(Some(config)) => {
            info!("Loaded config from {}", CONFIG_FILE_NAME);
            return Ok(config);
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            return Ok(Config::default());
        }
    }

    debug!("No config file found, using defaults");
    Ok(Config::default())
}

/// Format a duration as `MMminSSsecMMMms`.
fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    format!(
        "{:02}min{:02}sec{:03}ms",
        millis / 60_000,
        millis / 1000 % 60,
        millis % 1000
    )
}
