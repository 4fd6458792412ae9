use chrono::{DateTime, Utc};

use crate::config::DashboardConfig;
use crate::data::dataset::{Dataset, DimensionId, GroupId};
use crate::data::index::DatasetIndex;
use crate::data::model::Key;
use crate::error::{DashboardError, Result};
use crate::events::{DashboardEvent, Observers, SubscriptionId};
use crate::group::Group;
use crate::metrics::{BaseMetric, DerivedMetric, MetricRegistry, Point};
use crate::query::{self, format_value, RankedEntry, TableRow};
use crate::range::{default_ranges, Range};

// ---------------------------------------------------------------------------
// Category descriptors
// ---------------------------------------------------------------------------

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// How bucket keys of a breakdown are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Plain,
    /// ISO weekday ordinal → `Mon` … `Sun`.
    Weekday,
}

impl KeyFormat {
    pub fn format(self, key: &Key) -> String {
        match (self, key) {
            (KeyFormat::Weekday, Key::Ordinal(n)) => WEEKDAYS
                .get((*n as usize).wrapping_sub(1))
                .map(|s| s.to_string())
                .unwrap_or_else(|| n.to_string()),
            _ => key.to_string(),
        }
    }
}

/// A categorical breakdown shown under the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryData {
    /// Stable identifier used to address the breakdown (`day`, `hour`, …).
    pub id: String,
    /// Display name ("Day of week").
    pub name: String,
    pub dimension: DimensionId,
    pub group: GroupId,
    pub key_format: KeyFormat,
}

/// "value by week" → "Value by week".
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Displayed series
// ---------------------------------------------------------------------------

/// What the timeline chart draws: the base series over the active range and
/// the derived series computed from it. The two may differ in length.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedSeries {
    pub base_name: String,
    pub base: Vec<Point>,
    pub derived_name: String,
    pub derived: Vec<Point>,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// The dashboard model: indexed data, the groups behind every chart, the
/// active range and metric selections, and change observers.
#[derive(Debug)]
pub struct Dashboard {
    index: DatasetIndex,
    config: DashboardConfig,
    timeline: GroupId,
    categories: Vec<CategoryData>,
    table: GroupId,
    ranges: Vec<Range>,
    range: usize,
    registry: MetricRegistry,
    observers: Observers,
}

impl Dashboard {
    pub fn new(index: DatasetIndex, config: DashboardConfig) -> Result<Self> {
        Self::with_now(index, config, Utc::now())
    }

    /// Build with an explicit "now", which anchors the predefined ranges.
    ///
    /// The first range, the first base metric and the first derived metric
    /// are selected.
    pub fn with_now(mut index: DatasetIndex, config: DashboardConfig, now: DateTime<Utc>) -> Result<Self> {
        let config = config.validated();
        let ds = &mut index.dataset;
        let timeline = ds.add_group(index.week);

        let mut categories = vec![
            CategoryData {
                id: "day".to_string(),
                name: "Day of week".to_string(),
                dimension: index.weekday,
                group: ds.add_group(index.weekday),
                key_format: KeyFormat::Weekday,
            },
            CategoryData {
                id: "hour".to_string(),
                name: "Time of day".to_string(),
                dimension: index.time_of_day,
                group: ds.add_group(index.time_of_day),
                key_format: KeyFormat::Plain,
            },
        ];
        for (field, dimension) in &index.categories {
            categories.push(CategoryData {
                id: field.clone(),
                name: field.clone(),
                dimension: *dimension,
                group: ds.add_group(*dimension),
                key_format: KeyFormat::Plain,
            });
        }
        let table = ds.add_group(index.name);

        let first = ds
            .dimension(index.time)
            .first_key()
            .and_then(Key::as_time)
            .unwrap_or(now);
        let ranges = default_ranges(first, now)?;
        let registry = MetricRegistry::from_config(&config);

        let mut dashboard = Self {
            index,
            config,
            timeline,
            categories,
            table,
            ranges,
            range: 0,
            registry,
            observers: Observers::default(),
        };

        dashboard.apply_range(0);
        if let Some(base) = dashboard.registry.base_metrics().first().cloned() {
            dashboard.set_base_metric(&base)?;
        }
        if let Some(derived) = dashboard.registry.derived_metrics().first().copied() {
            dashboard.set_derived_metric(&derived)?;
        }
        Ok(dashboard)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.index.dataset
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    // -- observers --

    pub fn subscribe(&mut self, callback: impl FnMut(DashboardEvent) + 'static) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // -- ranges --

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range(&self) -> &Range {
        &self.ranges[self.range]
    }

    /// Activate a predefined range by name.
    pub fn set_range(&mut self, name: &str) -> Result<()> {
        let pos = self
            .ranges
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| DashboardError::UnknownRange(name.to_string()))?;
        self.apply_range(pos);
        self.observers.emit(DashboardEvent::StateChanged);
        Ok(())
    }

    fn apply_range(&mut self, pos: usize) {
        let Range { start, end, .. } = self.ranges[pos];
        self.index
            .dataset
            .filter_range(self.index.time, Key::Time(start), Key::Time(end));
        self.range = pos;
    }

    // -- metrics --

    pub fn base_metrics(&self) -> &[BaseMetric] {
        self.registry.base_metrics()
    }

    pub fn derived_metrics(&self) -> &[DerivedMetric] {
        self.registry.derived_metrics()
    }

    pub fn base_metric(&self) -> Option<&BaseMetric> {
        self.registry.base_metric()
    }

    pub fn derived_metric(&self) -> Option<&DerivedMetric> {
        self.registry.derived_metric()
    }

    /// Select a base metric; the timeline, every category and the table are
    /// re-reduced with it.
    pub fn set_base_metric(&mut self, metric: &BaseMetric) -> Result<()> {
        let groups = self.base_metric_groups();
        if self
            .registry
            .select_base(metric, &mut self.index.dataset, &groups)?
        {
            self.observers.emit(DashboardEvent::BaseMetricChanged);
        }
        Ok(())
    }

    pub fn set_base_metric_by_name(&mut self, name: &str) -> Result<()> {
        let metric = self.registry.find_base(name)?.clone();
        self.set_base_metric(&metric)
    }

    pub fn set_derived_metric(&mut self, metric: &DerivedMetric) -> Result<()> {
        if self.registry.select_derived(metric)? {
            self.observers.emit(DashboardEvent::DerivedMetricChanged);
        }
        Ok(())
    }

    pub fn set_derived_metric_by_name(&mut self, name: &str) -> Result<()> {
        let metric = *self.registry.find_derived(name)?;
        self.set_derived_metric(&metric)
    }

    fn base_metric_groups(&self) -> Vec<GroupId> {
        std::iter::once(self.timeline)
            .chain(self.categories.iter().map(|c| c.group))
            .chain(std::iter::once(self.table))
            .collect()
    }

    // -- timeline --

    pub fn timeline_group(&self) -> &Group {
        self.index.dataset.group(self.timeline)
    }

    /// Weekly buckets starting at or after the active range start, valued by
    /// the base metric.
    pub fn timeline_series(&self) -> Vec<Point> {
        let start = self.range().start;
        let group = self.timeline_group();
        let order = group.order();
        group
            .all()
            .filter_map(|(key, agg)| {
                let t = key.as_time()?;
                (t >= start).then(|| (t, order.value(agg)))
            })
            .collect()
    }

    /// The selected derived metric applied to [`Self::timeline_series`].
    pub fn derived_series(&self) -> Vec<Point> {
        match self.registry.derived_metric() {
            Some(metric) => metric.apply(&self.timeline_series()),
            None => Vec::new(),
        }
    }

    pub fn displayed_series(&self) -> DisplayedSeries {
        let base = self.timeline_series();
        let (derived_name, derived) = match self.registry.derived_metric() {
            Some(metric) => (metric.name(), metric.apply(&base)),
            None => (String::new(), Vec::new()),
        };
        DisplayedSeries {
            base_name: self.timeline_title(),
            base,
            derived_name,
            derived,
        }
    }

    /// "Value by week".
    pub fn timeline_title(&self) -> String {
        capitalize(&format!("{} by week", self.timeline_group().metric_name()))
    }

    // -- categories --

    pub fn categories(&self) -> &[CategoryData] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Result<&CategoryData> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DashboardError::UnknownCategory(id.to_string()))
    }

    /// Every bucket of a breakdown as (formatted key, value).
    pub fn category_entries(&self, id: &str) -> Result<Vec<(String, f64)>> {
        let category = self.category(id)?;
        let group = self.index.dataset.group(category.group);
        let order = group.order();
        Ok(group
            .all()
            .map(|(key, agg)| (category.key_format.format(key), order.value(agg)))
            .collect())
    }

    /// "Total value by day of week".
    pub fn category_subtitle(&self, id: &str) -> Result<String> {
        let category = self.category(id)?;
        let metric = self.index.dataset.group(category.group).metric_name();
        Ok(capitalize(&format!("Total {metric} by {}", category.name)))
    }

    /// Restrict a breakdown to the buckets whose formatted key is listed.
    ///
    /// The breakdown's own chart keeps the unselected buckets as zero ghosts.
    pub fn filter_category(&mut self, id: &str, values: &[&str]) -> Result<()> {
        let category = self.category(id)?;
        let dimension = category.dimension;
        let key_format = category.key_format;
        let keys: Vec<Key> = self
            .index
            .dataset
            .dimension(dimension)
            .keys()
            .filter(|k| values.contains(&key_format.format(k).as_str()))
            .cloned()
            .collect();
        self.index.dataset.filter_values(dimension, keys);
        self.observers.emit(DashboardEvent::StateChanged);
        Ok(())
    }

    pub fn clear_category(&mut self, id: &str) -> Result<()> {
        let dimension = self.category(id)?.dimension;
        self.index.dataset.clear_filter(dimension);
        self.observers.emit(DashboardEvent::StateChanged);
        Ok(())
    }

    // -- table --

    pub fn table_group(&self) -> &Group {
        self.index.dataset.group(self.table)
    }

    /// Highest names by the base metric, ghost buckets dropped.
    pub fn top_entries(&self, k: usize) -> Vec<RankedEntry> {
        query::top_entries(self.table_group(), k)
    }

    /// The ranked table: `table_size` rows of (formatted value, name).
    pub fn table_rows(&self) -> Vec<TableRow> {
        let metric = self.registry.base_metric();
        self.top_entries(self.config.table_size)
            .into_iter()
            .map(|entry| TableRow {
                value: metric.map_or_else(|| format_value(entry.value), |m| m.format(entry.value)),
                key: entry.key.to_string(),
            })
            .collect()
    }

    /// "Total value by name".
    pub fn table_subtitle(&self) -> String {
        capitalize(&format!("Total {} by name", self.table_group().metric_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{FieldValue, RawRecord};
    use chrono::{Duration, TimeZone};
    use std::cell::RefCell;
    use std::rc::Rc;

    const NAMES: [&str; 3] = ["north", "south", "east"];

    fn now() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap()
    }

    /// One record every 5 days and 7 hours over roughly three years, so weekdays and
    /// hours rotate.
    fn raw_records() -> Vec<RawRecord> {
        let start = now() - Duration::days(4 * 365);
        (0..220)
            .map(|i| {
                let t = start + Duration::days(5 * i) + Duration::hours(7 * i);
                let mut r = RawRecord::new();
                r.insert("t".into(), FieldValue::String(t.to_rfc3339()));
                r.insert("value".into(), FieldValue::Integer(i % 11 + 1));
                r.insert("name".into(), FieldValue::String(NAMES[i as usize % 3].into()));
                r
            })
            .collect()
    }

    fn dashboard() -> Dashboard {
        let config = DashboardConfig::default();
        let index = DatasetIndex::load(raw_records(), &config).unwrap();
        Dashboard::with_now(index, config, now()).unwrap()
    }

    fn snapshot(d: &Dashboard) -> Vec<Vec<(Key, f64)>> {
        let mut groups = vec![d.timeline_group().values(), d.table_group().values()];
        for c in d.categories() {
            groups.push(d.dataset().group(c.group).values());
        }
        groups
    }

    #[test]
    fn defaults_are_selected() {
        let d = dashboard();
        assert_eq!(d.range().name, "All time");
        assert_eq!(d.base_metric().map(|m| m.name.as_str()), Some("Value"));
        assert_eq!(d.derived_metric(), Some(&DerivedMetric::LinearRegression));
        assert_eq!(d.timeline_title(), "Value by week");
        assert_eq!(d.table_subtitle(), "Total value by name");
        assert_eq!(d.category_subtitle("day").unwrap(), "Total value by day of week");
        assert_eq!(d.dataset().active().count(), 220);
    }

    #[test]
    fn range_round_trip_restores_unfiltered_aggregates() {
        let mut d = dashboard();
        let fresh = snapshot(&d);

        d.set_range("1 year").unwrap();
        assert!(d.dataset().active().count() < 220);
        assert_ne!(snapshot(&d), fresh);

        d.set_range("All time").unwrap();
        assert_eq!(snapshot(&d), fresh);
    }

    #[test]
    fn range_round_trip_with_non_finite_values() {
        let config = DashboardConfig::default();
        let raw: Vec<RawRecord> = [("2020-01-06", f64::INFINITY), ("2024-06-03", 1.0), ("2024-06-03", f64::NAN)]
            .iter()
            .map(|&(t, value)| {
                let mut r = RawRecord::new();
                r.insert("t".into(), FieldValue::String(t.into()));
                r.insert("value".into(), FieldValue::Float(value));
                r.insert("name".into(), FieldValue::String("a".into()));
                r
            })
            .collect();
        let index = DatasetIndex::load(raw, &config).unwrap();
        let mut d = Dashboard::with_now(index, config, now()).unwrap();
        let fresh = snapshot(&d);
        assert_eq!(d.table_group().values(), vec![(Key::from("a"), 1.0)]);

        d.set_range("1 year").unwrap();
        d.set_range("All time").unwrap();
        assert_eq!(snapshot(&d), fresh);
    }

    #[test]
    fn unknown_range_is_rejected() {
        let mut d = dashboard();
        assert_eq!(
            d.set_range("forever"),
            Err(DashboardError::UnknownRange("forever".into()))
        );
        assert_eq!(d.range().name, "All time");
    }

    #[test]
    fn timeline_series_starts_at_range_start() {
        let mut d = dashboard();
        d.set_range("1 year").unwrap();
        let start = d.range().start;
        let series = d.timeline_series();
        assert!(!series.is_empty());
        assert!(series.iter().all(|(t, _)| *t >= start));
        for pair in series.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        // buckets before the range are still in the group as ghosts
        assert!(d.timeline_group().size() > series.len());
    }

    #[test]
    fn derived_series_follows_selection() {
        let mut d = dashboard();
        let base = d.timeline_series();

        d.set_derived_metric_by_name("Cumulative").unwrap();
        let cumulative = d.derived_series();
        assert_eq!(cumulative.len(), base.len());
        let total: f64 = base.iter().map(|(_, v)| v).sum();
        assert_eq!(cumulative.last().map(|p| p.1), Some(total));

        d.set_derived_metric_by_name("Smoothed (7-week gaussian)").unwrap();
        let shown = d.displayed_series();
        assert_eq!(shown.derived.len(), base.len() - 6);
        assert_eq!(shown.derived_name, "Smoothed (7-week gaussian)");
        assert_eq!(shown.base_name, "Value by week");
    }

    #[test]
    fn metric_changes_notify_observers() {
        let mut d = dashboard();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = d.subscribe(move |e| sink.borrow_mut().push(e));

        d.set_base_metric_by_name("Count").unwrap();
        d.set_base_metric_by_name("Count").unwrap();
        d.set_derived_metric_by_name("Cumulative").unwrap();
        d.set_range("2 years").unwrap();
        assert!(d.set_base_metric_by_name("Median").is_err());
        let bogus = BaseMetric::value("elsewhere");
        assert_eq!(
            d.set_base_metric(&bogus),
            Err(DashboardError::InvalidMetric("Value".into()))
        );

        assert_eq!(
            *seen.borrow(),
            vec![
                DashboardEvent::BaseMetricChanged,
                DashboardEvent::DerivedMetricChanged,
                DashboardEvent::StateChanged,
            ]
        );
        assert_eq!(d.base_metric().map(|m| m.name.as_str()), Some("Count"));
        assert_eq!(d.timeline_title(), "Count by week");

        assert!(d.unsubscribe(id));
        d.set_base_metric_by_name("Value").unwrap();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn count_metric_counts_records() {
        let mut d = dashboard();
        d.set_base_metric_by_name("Count").unwrap();
        let total: f64 = d.table_group().values().iter().map(|(_, v)| v).sum();
        assert_eq!(total, 220.0);
    }

    #[test]
    fn category_filter_narrows_table_and_timeline() {
        let mut d = dashboard();
        d.set_base_metric_by_name("Count").unwrap();

        let mondays = d
            .category_entries("day")
            .unwrap()
            .into_iter()
            .find(|(k, _)| k == "Mon")
            .map(|(_, v)| v)
            .unwrap();

        d.filter_category("day", &["Mon"]).unwrap();
        let table_total: f64 = d.top_entries(40).iter().map(|e| e.value).sum();
        assert_eq!(table_total, mondays);
        let timeline_total: f64 = d.timeline_series().iter().map(|(_, v)| v).sum();
        assert_eq!(timeline_total, mondays);

        d.clear_category("day").unwrap();
        let table_total: f64 = d.top_entries(40).iter().map(|e| e.value).sum();
        assert_eq!(table_total, 220.0);

        assert_eq!(
            d.filter_category("weather", &["sunny"]),
            Err(DashboardError::UnknownCategory("weather".into()))
        );
    }

    #[test]
    fn time_of_day_breakdown_skips_hour_23() {
        let config = DashboardConfig::default();
        let raw: Vec<RawRecord> = [0, 5, 6, 11, 12, 17, 18, 22, 23]
            .iter()
            .map(|&h| {
                let t = Utc.with_ymd_and_hms(2024, 6, 3, h, 30, 0).unwrap();
                let mut r = RawRecord::new();
                r.insert("t".into(), FieldValue::Integer(t.timestamp_millis()));
                r.insert("value".into(), FieldValue::Integer(1));
                r
            })
            .collect();
        let index = DatasetIndex::load(raw, &config).unwrap();
        let mut d = Dashboard::with_now(index, config, now()).unwrap();
        d.set_base_metric_by_name("Count").unwrap();

        let mut entries = d.category_entries("hour").unwrap();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            entries,
            vec![
                ("Afternoon".to_string(), 2.0),
                ("Evening".to_string(), 2.0),
                ("Morning".to_string(), 2.0),
                ("Night".to_string(), 2.0),
            ]
        );
        let total: f64 = d.timeline_group().values().iter().map(|(_, v)| v).sum();
        assert_eq!(total, 9.0);
    }

    #[test]
    fn table_rows_are_formatted() {
        let config = DashboardConfig {
            table_size: 2,
            ..DashboardConfig::default()
        };
        let raw: Vec<RawRecord> = [("big", 1_234_567), ("small", 12), ("tiny", 3)]
            .iter()
            .map(|&(name, value)| {
                let mut r = RawRecord::new();
                r.insert("t".into(), FieldValue::String("2024-06-03".into()));
                r.insert("name".into(), FieldValue::String(name.into()));
                r.insert("value".into(), FieldValue::Integer(value));
                r
            })
            .collect();
        let index = DatasetIndex::load(raw, &config).unwrap();
        let d = Dashboard::with_now(index, config, now()).unwrap();

        assert_eq!(
            d.table_rows(),
            vec![
                TableRow {
                    value: "1 234 567".into(),
                    key: "big".into()
                },
                TableRow {
                    value: "12".into(),
                    key: "small".into()
                },
            ]
        );
    }

    #[test]
    fn weekday_keys_are_named() {
        assert_eq!(KeyFormat::Weekday.format(&Key::Ordinal(1)), "Mon");
        assert_eq!(KeyFormat::Weekday.format(&Key::Ordinal(7)), "Sun");
        assert_eq!(KeyFormat::Weekday.format(&Key::Ordinal(9)), "9");
        assert_eq!(KeyFormat::Plain.format(&Key::from("Night")), "Night");
        assert_eq!(capitalize("total VALUE"), "Total value");
    }
}
