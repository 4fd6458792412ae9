//! Base and derived metrics and the registry selecting between them.

pub mod derived;
pub mod registry;

use crate::group::{Reducer, ValueAccessor};
use crate::query::format_value;

pub use derived::{DerivedMetric, Point};
pub use registry::MetricRegistry;

// ---------------------------------------------------------------------------
// Base metrics
// ---------------------------------------------------------------------------

/// A selectable primary quantity: how buckets aggregate records, and which
/// number of the aggregate is displayed and ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMetric {
    pub name: String,
    pub reducer: Reducer,
    pub accessor: ValueAccessor,
}

impl BaseMetric {
    /// Sum of a numeric field.
    pub fn value(field: &str) -> Self {
        Self {
            name: "Value".to_string(),
            reducer: Reducer::sum(field),
            accessor: ValueAccessor::Sum,
        }
    }

    /// Number of records.
    pub fn count() -> Self {
        Self {
            name: "Count".to_string(),
            reducer: Reducer::Count,
            accessor: ValueAccessor::Count,
        }
    }

    /// Format a value of this metric for display.
    pub fn format(&self, value: f64) -> String {
        format_value(value)
    }
}

/// Value first, then Count.
pub fn builtin_base_metrics(value_field: &str) -> Vec<BaseMetric> {
    vec![BaseMetric::value(value_field), BaseMetric::count()]
}
