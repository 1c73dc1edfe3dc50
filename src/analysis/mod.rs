//! Analysis modules.
//!
//! The aggregation index groups persons by unit and by age bucket; the
//! statistics engine turns a group's projected values into a summary.

pub mod aggregator;
pub mod statistics;

pub use aggregator::{AggregationIndex, Group, IndexLoader};
pub use statistics::Summary;
