//! Build errors for charts.

use crate::validation::ChartViolation;
use thiserror::Error;

/// Errors that can occur when building a chart.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Chart has no states. Call .declare(name) before .build()")]
    EmptyChart,

    #[error("Chart failed validation with {} violation(s): {}", .0.len(), summarize(.0))]
    InvalidChart(Vec<ChartViolation>),
}

impl BuildError {
    /// Violations behind an invalid chart, empty for other errors.
    pub fn violations(&self) -> &[ChartViolation] {
        match self {
            BuildError::InvalidChart(violations) => violations,
            BuildError::EmptyChart => &[],
        }
    }
}

fn summarize(violations: &[ChartViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
