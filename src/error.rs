use thiserror::Error;

// ---------------------------------------------------------------------------
// Core error taxonomy
// ---------------------------------------------------------------------------

/// Errors raised synchronously by the aggregation core.
///
/// Every failure is returned from the call that triggered it; the core keeps
/// no deferred error state and never retries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DashboardError {
    /// A record's timestamp field is missing or cannot be coerced to a time.
    #[error("record {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    /// A metric selection that is not a member of the registry.
    #[error("invalid metric '{0}'")]
    InvalidMetric(String),

    /// A range helper was given a unit other than day/week/month/year.
    #[error("invalid date unit '{0}', valid values are: day, week, month, year")]
    InvalidRangeUnit(String),

    #[error("unknown range '{0}'")]
    UnknownRange(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
