//! Report modules.
//!
//! Turns the finished aggregation index into the four CSV reports and the
//! optional JSON summary dump.

pub mod generator;

pub use generator::{generate_reports, write_summary_json};
