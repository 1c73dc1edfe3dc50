//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.staffstats.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up by default.
pub const CONFIG_FILE_NAME: &str = ".staffstats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input file names.
    #[serde(default)]
    pub input: InputConfig,

    /// Report file names.
    #[serde(default)]
    pub output: OutputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Number of threads registering persons.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}

/// Names of the three input files inside the input directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// One unit name per line.
    #[serde(default = "default_units_file")]
    pub units_file: String,

    /// `name,age` records.
    #[serde(default = "default_ages_file")]
    pub ages_file: String,

    /// `unitPosition,name,genre,income` records.
    #[serde(default = "default_persons_file")]
    pub persons_file: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            units_file: default_units_file(),
            ages_file: default_ages_file(),
            persons_file: default_persons_file(),
        }
    }
}

fn default_units_file() -> String {
    "departments.csv".to_string()
}

fn default_ages_file() -> String {
    "ages.csv".to_string()
}

fn default_persons_file() -> String {
    "employees.csv".to_string()
}

/// Report file names, relative to the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Median income by unit.
    #[serde(default = "default_income_by_unit")]
    pub income_by_unit: String,

    /// 95th percentile income by unit.
    #[serde(default = "default_income_p95_by_unit")]
    pub income_p95_by_unit: String,

    /// Mean income by age bucket.
    #[serde(default = "default_income_average_by_age")]
    pub income_average_by_age: String,

    /// Median age by unit.
    #[serde(default = "default_age_by_unit")]
    pub age_by_unit: String,

    /// Optional JSON dump of every group's full summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            income_by_unit: default_income_by_unit(),
            income_p95_by_unit: default_income_p95_by_unit(),
            income_average_by_age: default_income_average_by_age(),
            age_by_unit: default_age_by_unit(),
            summary_json: None,
        }
    }
}

fn default_income_by_unit() -> String {
    "income-by-department.csv".to_string()
}

fn default_income_p95_by_unit() -> String {
    "income-95-by-department.csv".to_string()
}

fn default_income_average_by_age() -> String {
    "income-average-by-age-range.csv".to_string()
}

fn default_age_by_unit() -> String {
    "employee-age-by-department.csv".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from a directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Try to load configuration from the current directory.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only where they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(workers) = args.workers {
            self.general.workers = workers;
        }

        if let Some(ref summary_json) = args.summary_json {
            self.output.summary_json = Some(summary_json.display().to_string());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
