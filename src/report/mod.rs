//! The uptime report pipeline.
//!
//! `windows` builds the trailing report ranges, `hours` clips them to each
//! site's business-hours calendar, `timeline` merges in the observation
//! stream, `estimator` turns the result into duration estimates, and
//! `aggregator` runs the pipeline across all sites. `jobs` owns the report
//! job lifecycle and `writer` the CSV artifact.

pub mod aggregator;
pub mod estimator;
pub mod hours;
pub mod interval;
pub mod jobs;
pub mod timeline;
pub mod windows;
pub mod writer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// An upstream-contract violation (unsorted observations, overlapping
    /// sub-intervals). Aborts the offending site's row, never the report.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use aggregator::{Report, ReportAggregator};
pub use jobs::{JobState, ReportJobs};
