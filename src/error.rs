//! Error types for the aggregation index.
//!
//! Only precondition and lifecycle violations are errors here. Bad data rows
//! are not: they are skipped with a diagnostic by whoever feeds the index.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// A value handed to the index can never be valid, no matter the state.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unit registration attempted after person registration started.
    #[error("Load phase closed: {0}")]
    LoadPhaseClosed(String),
}
