//! Parsing the input files and loading them into the aggregation index.
//!
//! Loading order is fixed: units, then the age lookup, then persons. A bad
//! row is skipped with a warning and never aborts the run; only I/O failures
//! are fatal.

use crate::analysis::aggregator::Admission;
use crate::analysis::{AggregationIndex, IndexLoader};
use crate::error::IndexError;
use crate::models::{Age, Genre, Person, Unit};
use crate::scanner::InputFiles;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Counts gathered while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub units: usize,
    pub ages: usize,
    pub persons_accepted: usize,
    pub persons_rejected: usize,
    pub lines_skipped: usize,
}

/// Name to age lookup built from the ages file.
pub type AgeTable = HashMap<String, u32>;

/// Load all three input files into a finished index.
pub fn load(files: &InputFiles, workers: usize) -> Result<(AggregationIndex, LoadReport)> {
    let mut report = LoadReport::default();
    let mut loader = IndexLoader::new();

    let (units, skipped) = load_units(&mut loader, open(&files.units)?, &source(&files.units))?;
    report.units = units;
    report.lines_skipped += skipped;
    info!("Loaded {} departments", report.units);

    let (ages, skipped) = parse_ages(open(&files.ages)?, &source(&files.ages))?;
    report.ages = ages.len();
    report.lines_skipped += skipped;
    info!("Loaded {} ages", report.ages);

    let (persons, skipped) = parse_persons(open(&files.persons)?, &ages, &source(&files.persons))?;
    report.lines_skipped += skipped;

    let (accepted, rejected) = register_persons(&loader, persons, workers)?;
    report.persons_accepted = accepted;
    report.persons_rejected = rejected;
    info!(
        "Loaded {} employees ({} rejected, {} lines skipped)",
        report.persons_accepted, report.persons_rejected, report.lines_skipped
    );

    Ok((loader.finish(), report))
}

/// Register every non-blank line as a unit. Returns (units registered, lines skipped).
pub fn load_units<R: Read>(
    loader: &mut IndexLoader,
    reader: R,
    source: &str,
) -> Result<(usize, usize)> {
    let mut skipped = 0;

    for (number, bytes) in BufReader::new(reader).split(b'\n').enumerate() {
        let mut bytes = bytes.with_context(|| format!("Failed to read {}", source))?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping line {} in {}: {}", number + 1, source, e);
                skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            debug!("Skipping blank line {} in {}", number + 1, source);
            continue;
        }

        match loader.register_unit(Unit::new(line)) {
            Ok(_) => {}
            Err(IndexError::InvalidArgument(reason)) => {
                warn!("Skipping line {} in {}: {}", number + 1, source, reason);
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!("Departments in order: {:?}", loader.units());
    Ok((loader.unit_count(), skipped))
}

/// Parse `name,age` records. Later duplicates overwrite earlier ones.
pub fn parse_ages<R: Read>(reader: R, source: &str) -> Result<(AgeTable, usize)> {
    let mut ages = AgeTable::new();

    let skipped = for_each_record(reader, source, 2, |record| {
        let age = record[1]
            .parse::<u32>()
            .map_err(|e| format!("invalid age \"{}\": {}", &record[1], e))?;
        ages.insert(record[0].to_string(), age);
        Ok(())
    })?;

    Ok((ages, skipped))
}

/// Parse `unitPosition,name,genre,income` records, resolving ages by name.
pub fn parse_persons<R: Read>(
    reader: R,
    ages: &AgeTable,
    source: &str,
) -> Result<(Vec<Person>, usize)> {
    let mut persons = Vec::new();

    let skipped = for_each_record(reader, source, 4, |record| {
        let position = record[0]
            .parse::<i64>()
            .map_err(|e| format!("invalid department id \"{}\": {}", &record[0], e))?;
        let income = record[3]
            .parse::<f64>()
            .map_err(|e| format!("invalid income \"{}\": {}", &record[3], e))?;
        if !income.is_finite() {
            return Err(format!("invalid income \"{}\": not a finite number", &record[3]));
        }

        let name = &record[1];
        let age = Age::from(ages.get(name).copied());
        if age == Age::Unknown {
            debug!("No age found for {}", name);
        }

        persons.push(Person::new(position, name, Genre::from(&record[2]), income, age));
        Ok(())
    })?;

    Ok((persons, skipped))
}

/// Register persons concurrently on a pool of `workers` threads.
/// Returns (accepted, rejected).
pub fn register_persons(
    loader: &IndexLoader,
    persons: Vec<Person>,
    workers: usize,
) -> Result<(usize, usize)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("Failed to build worker pool")?;

    let admissions: Vec<Admission> = pool.install(|| {
        persons
            .into_par_iter()
            .map(|person| loader.register_person(person))
            .collect::<Result<_, IndexError>>()
    })?;

    let accepted = admissions
        .iter()
        .filter(|admission| matches!(admission, Admission::Accepted(_)))
        .count();
    Ok((accepted, admissions.len() - accepted))
}

/// Run `handle` on every record with exactly `fields` columns. Rows with the
/// wrong shape, or rejected by `handle`, are logged and counted as skipped.
fn for_each_record<R, F>(reader: R, source: &str, fields: usize, mut handle: F) -> Result<usize>
where
    R: Read,
    F: FnMut(&StringRecord) -> Result<(), String>,
{
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut skipped = 0;
    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("Failed to read {}", source));
            }
            Err(e) => {
                warn!("Wrong format in input {}: {}", source, e);
                skipped += 1;
                continue;
            }
        };

        let line = record.position().map_or(0, |p| p.line());
        let outcome = if record.len() != fields {
            Err(format!(
                "expected {} fields, found {}",
                fields,
                record.len()
            ))
        } else {
            handle(&record)
        };

        if let Err(reason) = outcome {
            warn!("Wrong format in input {} at line {}: {}", source, line, reason);
            skipped += 1;
        }
    }

    Ok(skipped)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn source(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
