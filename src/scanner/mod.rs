//! Input discovery.
//!
//! Looks for the three configured input files directly inside the input
//! directory. Other entries are ignored.

use crate::config::InputConfig;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths of the three input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFiles {
    pub units: PathBuf,
    pub ages: PathBuf,
    pub persons: PathBuf,
}

/// Scanner for the input directory.
pub struct InputScanner {
    config: InputConfig,
    input_dir: PathBuf,
}

impl InputScanner {
    /// Create a new input scanner.
    pub fn new(input_dir: PathBuf, config: InputConfig) -> Self {
        Self { config, input_dir }
    }

    /// Locate all three input files; fails if any of them is missing.
    pub fn scan(&self) -> Result<InputFiles> {
        if !self.input_dir.is_dir() {
            bail!(
                "This path {} does not denote a directory",
                self.input_dir.display()
            );
        }

        let mut units = None;
        let mut ages = None;
        let mut persons = None;

        let entries = fs::read_dir(&self.input_dir).with_context(|| {
            format!("Cannot read input directory {}", self.input_dir.display())
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();

            if name == self.config.units_file {
                units = Some(path);
            } else if name == self.config.ages_file {
                ages = Some(path);
            } else if name == self.config.persons_file {
                persons = Some(path);
            } else {
                debug!("Skipping {}, not an input file", name);
            }
        }

        match (units, ages, persons) {
            (Some(units), Some(ages), Some(persons)) => Ok(InputFiles {
                units,
                ages,
                persons,
            }),
            _ => bail!(
                "Make sure all required files ({}, {}, {}) are in the provided path {}",
                self.config.ages_file,
                self.config.units_file,
                self.config.persons_file,
                self.input_dir.display()
            ),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}
