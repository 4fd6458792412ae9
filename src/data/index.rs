use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};

use super::dataset::{Dataset, DimensionId};
use super::dimension::{week_start, DimensionKind};
use super::model::{coerce_timestamp, RawRecord, Record};

// ---------------------------------------------------------------------------
// DatasetIndex – the loaded dataset with its standard dimensions
// ---------------------------------------------------------------------------

/// A dataset together with the dimensions every dashboard is built on.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    pub dataset: Dataset,
    /// Raw record timestamp; the active range filters this dimension.
    pub time: DimensionId,
    /// ISO week start; the timeline is grouped on it.
    pub week: DimensionId,
    /// ISO weekday 1–7.
    pub weekday: DimensionId,
    /// Night / Morning / Afternoon / Evening.
    pub time_of_day: DimensionId,
    /// Free-text name used by the table.
    pub name: DimensionId,
    /// Configured extra category fields, in config order.
    pub categories: Vec<(String, DimensionId)>,
}

impl DatasetIndex {
    /// Parse every record's timestamp and index the result.
    ///
    /// All-or-nothing: the first record without a coercible timestamp fails
    /// the whole load with [`DashboardError::InvalidRecord`].
    pub fn load(raw: Vec<RawRecord>, config: &DashboardConfig) -> Result<Self> {
        let mut records = Vec::with_capacity(raw.len());
        for (row, fields) in raw.into_iter().enumerate() {
            let value = fields
                .get(&config.time_field)
                .ok_or_else(|| DashboardError::InvalidRecord {
                    row,
                    reason: format!("missing '{}' field", config.time_field),
                })?;
            let t = coerce_timestamp(value)
                .map_err(|reason| DashboardError::InvalidRecord { row, reason })?;
            if week_start(t).is_none() {
                return Err(DashboardError::InvalidRecord {
                    row,
                    reason: format!("timestamp {t} has no representable week"),
                });
            }
            records.push(Record::new(t, fields));
        }
        Ok(Self::build(records, config))
    }

    /// Index already-parsed records.
    pub fn build(records: Vec<Record>, config: &DashboardConfig) -> Self {
        let mut dataset = Dataset::new(records);
        let time = dataset.add_dimension(DimensionKind::Time);
        let week = dataset.add_dimension(DimensionKind::Week);
        let weekday = dataset.add_dimension(DimensionKind::Weekday);
        let time_of_day = dataset.add_dimension(DimensionKind::TimeOfDay);
        let name = dataset.add_dimension(DimensionKind::Field(config.name_field.clone()));
        let categories = config
            .category_fields
            .iter()
            .map(|field| {
                let id = dataset.add_dimension(DimensionKind::Field(field.clone()));
                (field.clone(), id)
            })
            .collect();

        log::debug!("indexed {} records", dataset.len());

        Self {
            dataset,
            time,
            week,
            weekday,
            time_of_day,
            name,
            categories,
        }
    }
}
