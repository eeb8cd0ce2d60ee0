//! Engine error taxonomy.
//!
//! Validation failures are raised at the calculator boundary and never
//! defaulted away. Empty exceedance curves and baseline effectiveness floors
//! are ordinary results, not errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A required FAIR parameter (or one of its bounds) is absent
    #[error("Missing FAIR input: {field}")]
    MissingInput { field: String },

    /// Negative, non-finite, or outside the allowed interval
    #[error("Value {value} for '{field}' is out of range (expected {expected})")]
    OutOfRange {
        field: String,
        value: f64,
        expected: &'static str,
    },

    /// Triangular estimate with min > avg or avg > max
    #[error("Degenerate estimate for '{field}': min={min}, avg={avg}, max={max}")]
    DegenerateDistribution {
        field: String,
        min: f64,
        avg: f64,
        max: f64,
    },

    /// Exceedance points not strictly ordered (probability down, loss up)
    #[error("Curve '{name}' is not monotone at point {index}")]
    NonMonotoneCurve { name: String, index: usize },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Failure reported by a repository collaborator
    #[error("Repository error: {0}")]
    Repository(String),
}

impl EngineError {
    pub fn missing(field: impl Into<String>) -> Self {
        EngineError::MissingInput {
            field: field.into(),
        }
    }

    pub fn out_of_range(field: impl Into<String>, value: f64, expected: &'static str) -> Self {
        EngineError::OutOfRange {
            field: field.into(),
            value,
            expected,
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True for errors caused by bad record data rather than a failing collaborator
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::MissingInput { .. }
                | EngineError::OutOfRange { .. }
                | EngineError::DegenerateDistribution { .. }
                | EngineError::NonMonotoneCurve { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
