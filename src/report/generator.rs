//! Report generation.
//!
//! Each report walks one grouping of the index, summarizes every group's
//! projected values and writes one CSV row per group: the group label and a
//! single statistic with two decimals. A report that cannot be written is
//! logged and does not stop the others.

use crate::analysis::{AggregationIndex, Group, Summary};
use crate::config::OutputConfig;
use crate::models::AgeBucket;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// The four reports, in the order they are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    MedianIncomeByUnit,
    P95IncomeByUnit,
    MeanIncomeByAgeBucket,
    MedianAgeByUnit,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::MedianIncomeByUnit => write!(f, "median income by department"),
            ReportKind::P95IncomeByUnit => write!(f, "95-percentile income by department"),
            ReportKind::MeanIncomeByAgeBucket => write!(f, "average income by age range"),
            ReportKind::MedianAgeByUnit => write!(f, "median employee age by department"),
        }
    }
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::MedianIncomeByUnit,
        ReportKind::P95IncomeByUnit,
        ReportKind::MeanIncomeByAgeBucket,
        ReportKind::MedianAgeByUnit,
    ];

    /// Header row of the CSV file.
    pub fn header(&self) -> [&'static str; 2] {
        match self {
            ReportKind::MedianIncomeByUnit => ["DEPARTMENT", "MEDIAN INCOME"],
            ReportKind::P95IncomeByUnit => ["DEPARTMENT", "95-PERCENTILE INCOME"],
            ReportKind::MeanIncomeByAgeBucket => ["AGE RANGE", "AVERAGE INCOME"],
            ReportKind::MedianAgeByUnit => ["DEPARTMENT", "MEDIAN EMPLOYEE AGE"],
        }
    }

    pub fn file_name<'a>(&self, config: &'a OutputConfig) -> &'a str {
        match self {
            ReportKind::MedianIncomeByUnit => &config.income_by_unit,
            ReportKind::P95IncomeByUnit => &config.income_p95_by_unit,
            ReportKind::MeanIncomeByAgeBucket => &config.income_average_by_age,
            ReportKind::MedianAgeByUnit => &config.age_by_unit,
        }
    }

    /// The statistic this report publishes.
    pub fn statistic(&self, summary: &Summary) -> f64 {
        match self {
            ReportKind::MedianIncomeByUnit | ReportKind::MedianAgeByUnit => summary.median,
            ReportKind::P95IncomeByUnit => summary.p95,
            ReportKind::MeanIncomeByAgeBucket => summary.mean,
        }
    }

    fn summarize(&self, index: &AggregationIndex, group: Group<'_>) -> Summary {
        match self {
            ReportKind::MedianAgeByUnit => Summary::compute(index.projected_ages(group)),
            _ => Summary::compute(index.projected_incomes(group)),
        }
    }
}

/// One group of a report with its full summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub summary: Summary,
}

/// What happened to one report file.
#[derive(Debug)]
pub struct ReportOutcome {
    pub kind: ReportKind,
    pub path: PathBuf,
    pub result: Result<()>,
}

impl ReportOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Serialize)]
struct SummaryDump<'a> {
    report: ReportKind,
    groups: &'a [ReportRow],
}

/// Summarize every group of the grouping `kind` reports on.
///
/// Units come in sorted order, age buckets in declared order.
pub fn build_rows(index: &AggregationIndex, kind: ReportKind) -> Vec<ReportRow> {
    let groups: Vec<Group<'_>> = match kind {
        ReportKind::MeanIncomeByAgeBucket => {
            AgeBucket::ALL.iter().copied().map(Group::Bucket).collect()
        }
        _ => index.units_in_order().iter().map(Group::Unit).collect(),
    };

    groups
        .into_iter()
        .map(|group| {
            let summary = kind.summarize(index, group);
            debug!("{} [{}]: {}", kind, group, summary);
            ReportRow {
                label: group.to_string(),
                summary,
            }
        })
        .collect()
}

/// Write the header and one row per group.
pub fn write_rows<W: Write>(writer: W, kind: ReportKind, rows: &[ReportRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(kind.header())?;
    for row in rows {
        let value = format!("{:.2}", kind.statistic(&row.summary));
        csv_writer.write_record([row.label.as_str(), value.as_str()])?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Write one report file.
pub fn write_report(path: &Path, kind: ReportKind, rows: &[ReportRow]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Can't write to output file {}", path.display()))?;
    write_rows(BufWriter::new(file), kind, rows)
        .with_context(|| format!("Can't write to output file {}", path.display()))
}

/// Generate all four reports into `output_dir`.
///
/// Never fails as a whole: each report's result is returned separately.
pub fn generate_reports(
    index: &AggregationIndex,
    output_dir: &Path,
    config: &OutputConfig,
) -> Vec<ReportOutcome> {
    let everyone = Summary::compute(index.all_members().values().map(|person| person.income));
    debug!("Income over all employees: {}", everyone.machine_readable());

    ReportKind::ALL
        .iter()
        .map(|&kind| {
            let path = output_dir.join(kind.file_name(config));
            let rows = build_rows(index, kind);
            let result = write_report(&path, kind, &rows);

            match &result {
                Ok(()) => info!("Wrote {} ({} rows) to {}", kind, rows.len(), path.display()),
                Err(e) => error!("Failed to write {}: {:#}", kind, e),
            }

            ReportOutcome { kind, path, result }
        })
        .collect()
}

/// Render every report's full summaries as pretty JSON.
pub fn generate_summary_json(index: &AggregationIndex) -> Result<String> {
    let rows: Vec<(ReportKind, Vec<ReportRow>)> = ReportKind::ALL
        .iter()
        .map(|&kind| (kind, build_rows(index, kind)))
        .collect();
    let dump: Vec<SummaryDump<'_>> = rows
        .iter()
        .map(|(kind, groups)| SummaryDump {
            report: *kind,
            groups,
        })
        .collect();

    serde_json::to_string_pretty(&dump).map_err(Into::into)
}

/// Write the JSON summary dump to a file.
pub fn write_summary_json(index: &AggregationIndex, path: &Path) -> Result<()> {
    let content = generate_summary_json(index)?;

    let mut file = File::create(path)
        .with_context(|| format!("Can't write to output file {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
