use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

/// Options applied when a dataset is indexed and the dashboard is built.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides:
///
/// ```json
/// { "time_field": "timestamp", "gaussian_degree": 3 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Record field parsed as the timestamp.
    pub time_field: String,
    /// Numeric field summed by the Value metric.
    pub value_field: String,
    /// Free-text field keyed by the name/table dimension.
    pub name_field: String,
    /// Extra string fields; each gets its own category breakdown.
    pub category_fields: Vec<String>,
    /// Window of the moving-average derived metric.
    pub moving_average_window: usize,
    /// Degree of the Gaussian smoothing derived metric.
    pub gaussian_degree: usize,
    /// Number of rows returned by the table query.
    pub table_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            time_field: "t".to_string(),
            value_field: "value".to_string(),
            name_field: "name".to_string(),
            category_fields: Vec::new(),
            moving_average_window: 4,
            gaussian_degree: 4,
            table_size: 40,
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: DashboardConfig =
            serde_json::from_str(&text).context("parsing config JSON")?;
        Ok(config.validated())
    }

    /// Clamp window-like options to at least 1.
    pub fn validated(mut self) -> Self {
        self.moving_average_window = self.moving_average_window.max(1);
        self.gaussian_degree = self.gaussian_degree.max(1);
        self
    }
}
