//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// StaffStats - grouped income and age statistics by department
///
/// Reads departments.csv, ages.csv and employees.csv from the input
/// directory and writes four CSV reports: median income, 95th percentile
/// income and median age by department, and average income by age range.
///
/// Examples:
///   staffstats --input ./data
///   staffstats --input ./data --output ./reports --workers 8
///   staffstats --input ./data --summary-json summary.json
///   staffstats --input ./data --dry-run
///   staffstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory holding the three input files
    #[arg(short, long, value_name = "DIR", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Directory the reports are written to
    ///
    /// Defaults to the input directory. Created if it does not exist.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .staffstats.toml in the input directory,
    /// then in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of threads registering persons
    #[arg(short, long, value_name = "NUM", env = "STAFFSTATS_WORKERS")]
    pub workers: Option<usize>,

    /// Also write every group's full statistics as JSON to this file
    ///
    /// Relative paths are resolved against the output directory.
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Load and validate the input without writing any report
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .staffstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The input directory; empty when not set (should be validated first).
    pub fn input_dir(&self) -> &Path {
        self.input.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// The output directory, falling back to the input directory.
    pub fn output_dir(&self) -> &Path {
        self.output.as_deref().unwrap_or_else(|| self.input_dir())
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref input) = self.input else {
            return Err("An input directory is required (--input)".to_string());
        };
        if !input.exists() {
            return Err(format!("Input directory does not exist: {}", input.display()));
        }
        if !input.is_dir() {
            return Err(format!("Input path is not a directory: {}", input.display()));
        }

        if let Some(ref output) = self.output {
            if output.exists() && !output.is_dir() {
                return Err(format!(
                    "Output path is not a directory: {}",
                    output.display()
                ));
            }
        }

        if self.workers == Some(0) {
            return Err("Workers must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            input: Some(std::env::temp_dir()),
            output: None,
            config: None,
            workers: None,
            summary_json: None,
            dry_run: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/a/real/dir"));
        assert!(args.validate().is_err());

        args.input = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_input_is_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut args = make_args();
        args.input = Some(file.path().to_path_buf());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_workers() {
        let mut args = make_args();
        args.workers = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_output_defaults_to_input() {
        let mut args = make_args();
        assert_eq!(args.output_dir(), args.input_dir());

        args.output = Some(PathBuf::from("reports"));
        assert_eq!(args.output_dir(), Path::new("reports"));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from(["staffstats", "--input", "data", "-w", "3"]).unwrap();
        assert_eq!(args.input.as_deref(), Some(Path::new("data")));
        assert_eq!(args.workers, Some(3));

        assert!(Args::try_parse_from(["staffstats"]).is_err());
        assert!(Args::try_parse_from(["staffstats", "--init-config"]).is_ok());
    }
}
