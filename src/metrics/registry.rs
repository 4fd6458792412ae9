use crate::config::DashboardConfig;
use crate::data::dataset::{Dataset, GroupId};
use crate::error::{DashboardError, Result};

use super::derived::{builtin_derived_metrics, DerivedMetric};
use super::{builtin_base_metrics, BaseMetric};

// ---------------------------------------------------------------------------
// MetricRegistry
// ---------------------------------------------------------------------------

/// Catalog of selectable metrics and the current selection.
///
/// Selections are validated against the catalog; a rejected selection leaves
/// the previous one in place.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    base: Vec<BaseMetric>,
    derived: Vec<DerivedMetric>,
    base_selected: Option<usize>,
    derived_selected: Option<usize>,
}

impl MetricRegistry {
    pub fn new(base: Vec<BaseMetric>, derived: Vec<DerivedMetric>) -> Self {
        Self {
            base,
            derived,
            base_selected: None,
            derived_selected: None,
        }
    }

    /// The built-in metrics parameterised by the config.
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            builtin_base_metrics(&config.value_field),
            builtin_derived_metrics(config.moving_average_window, config.gaussian_degree),
        )
    }

    pub fn base_metrics(&self) -> &[BaseMetric] {
        &self.base
    }

    pub fn derived_metrics(&self) -> &[DerivedMetric] {
        &self.derived
    }

    pub fn base_metric(&self) -> Option<&BaseMetric> {
        self.base_selected.map(|i| &self.base[i])
    }

    pub fn derived_metric(&self) -> Option<&DerivedMetric> {
        self.derived_selected.map(|i| &self.derived[i])
    }

    pub fn find_base(&self, name: &str) -> Result<&BaseMetric> {
        self.base
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| DashboardError::InvalidMetric(name.to_string()))
    }

    pub fn find_derived(&self, name: &str) -> Result<&DerivedMetric> {
        self.derived
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| DashboardError::InvalidMetric(name.to_string()))
    }

    /// Select a base metric and rewire `groups` to it.
    ///
    /// Every group is re-reduced with the metric's reducer and takes its name
    /// and ordering. Returns `Ok(false)` when the metric was already selected.
    pub fn select_base(
        &mut self,
        metric: &BaseMetric,
        dataset: &mut Dataset,
        groups: &[GroupId],
    ) -> Result<bool> {
        let pos = self
            .base
            .iter()
            .position(|m| m == metric)
            .ok_or_else(|| DashboardError::InvalidMetric(metric.name.clone()))?;
        if self.base_selected == Some(pos) {
            return Ok(false);
        }

        for &id in groups {
            dataset.reduce(id, metric.reducer.clone());
            let group = dataset.group_mut(id);
            group.set_metric_name(metric.name.clone());
            group.set_order(metric.accessor);
        }
        self.base_selected = Some(pos);
        log::debug!("base metric set to {}", metric.name);
        Ok(true)
    }

    /// Select a derived metric. Groups are untouched.
    pub fn select_derived(&mut self, metric: &DerivedMetric) -> Result<bool> {
        let pos = self
            .derived
            .iter()
            .position(|m| m == metric)
            .ok_or_else(|| DashboardError::InvalidMetric(metric.name()))?;
        if self.derived_selected == Some(pos) {
            return Ok(false);
        }
        self.derived_selected = Some(pos);
        log::debug!("derived metric set to {}", metric.name());
        Ok(true)
    }
}
