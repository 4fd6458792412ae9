use crate::group::{Group, Reducer};

use super::dimension::{Dimension, DimensionKind};
use super::filter::Filter;
use super::model::{Key, Record};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle of a dimension, valid for the dataset that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionId(usize);

/// Handle of a group, valid for the dataset that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

// ---------------------------------------------------------------------------
// Active set
// ---------------------------------------------------------------------------

/// Records passing every dimension filter.
///
/// Each record keeps the number of dimension filters it currently fails;
/// a record is active iff that number is zero.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    failures: Vec<u32>,
}

impl ActiveSet {
    fn new(len: usize) -> Self {
        Self {
            failures: vec![0; len],
        }
    }

    pub fn is_active(&self, i: usize) -> bool {
        self.failures.get(i).is_some_and(|&f| f == 0)
    }

    /// Number of active records.
    pub fn count(&self) -> usize {
        self.failures.iter().filter(|&&f| f == 0).count()
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Immutable records plus the dimensions and groups built over them.
///
/// All dimensions share one [`ActiveSet`]. A filter change on any dimension
/// updates every group of the dataset before returning, so readers never see
/// a mix of old and new aggregates.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    dimensions: Vec<Dimension>,
    groups: Vec<Group>,
    active: ActiveSet,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        let active = ActiveSet::new(records.len());
        Self {
            records,
            dimensions: Vec::new(),
            groups: Vec::new(),
            active,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    /// Index the records along a new dimension. It starts unfiltered.
    pub fn add_dimension(&mut self, kind: DimensionKind) -> DimensionId {
        self.dimensions.push(Dimension::build(kind, &self.records));
        DimensionId(self.dimensions.len() - 1)
    }

    pub fn dimension(&self, id: DimensionId) -> &Dimension {
        &self.dimensions[id.0]
    }

    /// Create a count-reduced group over a dimension, seeded from the
    /// current active set.
    pub fn add_group(&mut self, dimension: DimensionId) -> GroupId {
        let group = Group::build(
            dimension,
            &self.dimensions[dimension.0],
            &self.records,
            &self.active,
            Reducer::default(),
        );
        self.groups.push(group);
        GroupId(self.groups.len() - 1)
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.0]
    }

    /// Replace a group's reducer; all its buckets are recomputed.
    pub fn reduce(&mut self, id: GroupId, reducer: Reducer) {
        let group = &mut self.groups[id.0];
        let dim = &self.dimensions[group.dimension().0];
        group.rebuild(reducer, dim, &self.records, &self.active);
        log::debug!("group {} now reduced by {:?}", id.0, group.reducer());
    }

    pub fn filter_range(&mut self, dimension: DimensionId, lo: impl Into<Key>, hi: impl Into<Key>) {
        self.filter(dimension, Filter::range(lo, hi));
    }

    pub fn filter_values<I, K>(&mut self, dimension: DimensionId, values: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.filter(dimension, Filter::values(values));
    }

    pub fn clear_filter(&mut self, dimension: DimensionId) {
        self.filter(dimension, Filter::All);
    }

    /// Replace the filter of one dimension and propagate the change.
    ///
    /// Only records whose status under this dimension flips are visited; of
    /// those, the ones entering or leaving the active set are added to or
    /// removed from every group.
    pub fn filter(&mut self, id: DimensionId, filter: Filter) {
        let Dataset {
            records,
            dimensions,
            groups,
            active,
        } = self;

        let dim = &dimensions[id.0];
        let mut entering = Vec::new();
        let mut leaving = Vec::new();
        for i in dim.flipped_records(&filter) {
            let was_active = active.failures[i] == 0;
            if filter.matches(dim.key_of(i)) {
                active.failures[i] -= 1;
            } else {
                active.failures[i] += 1;
            }
            match (was_active, active.failures[i] == 0) {
                (true, false) => leaving.push(i),
                (false, true) => entering.push(i),
                _ => {}
            }
        }
        dimensions[id.0].set_filter(filter);

        for group in groups.iter_mut() {
            let group_dim = &dimensions[group.dimension().0];
            for &i in &leaving {
                if let Some(key) = group_dim.key_of(i) {
                    group.remove(key, &records[i]);
                }
            }
            for &i in &entering {
                if let Some(key) = group_dim.key_of(i) {
                    group.add(key, &records[i]);
                }
            }
        }

        log::debug!(
            "filter on dimension {}: {} records entered, {} left",
            id.0,
            entering.len(),
            leaving.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{FieldValue, RawRecord};
    use crate::group::Aggregate;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    const NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

    fn make_records(rows: &[(i64, i64, i32, usize)]) -> Vec<Record> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        rows.iter()
            .map(|&(day, hour, value, name)| {
                let mut fields = RawRecord::new();
                fields.insert("value".into(), FieldValue::Integer(value as i64));
                fields.insert("name".into(), FieldValue::String(NAMES[name].into()));
                Record::new(base + Duration::days(day) + Duration::hours(hour), fields)
            })
            .collect()
    }

    fn full_recompute(ds: &Dataset, group: &Group) -> BTreeMap<Key, Aggregate> {
        let dim = ds.dimension(group.dimension());
        let mut out: BTreeMap<Key, Aggregate> =
            dim.keys().map(|k| (k.clone(), Aggregate::default())).collect();
        for (i, r) in ds.records().iter().enumerate() {
            let passes = ds.dimensions.iter().all(|d| d.filter().matches(d.key_of(i)));
            if !passes {
                continue;
            }
            if let Some(k) = dim.key_of(i) {
                let acc = out.get_mut(k).unwrap();
                *acc = group.reducer().add(*acc, r);
            }
        }
        out
    }

    fn snapshot(group: &Group) -> BTreeMap<Key, Aggregate> {
        group.all().map(|(k, a)| (k.clone(), *a)).collect()
    }

    #[test]
    fn filter_on_one_dimension_updates_groups_on_another() {
        let records = make_records(&[(0, 1, 10, 0), (0, 8, 20, 1), (1, 13, 30, 0), (2, 19, 40, 2)]);
        let mut ds = Dataset::new(records);
        let tod = ds.add_dimension(DimensionKind::TimeOfDay);
        let name = ds.add_dimension(DimensionKind::Field("name".into()));
        let by_name = ds.add_group(name);
        ds.reduce(by_name, Reducer::sum("value"));

        assert_eq!(ds.group(by_name).get(&Key::from("alpha")).unwrap().sum, 40.0);

        ds.filter_values(tod, ["Night", "Evening"]);
        assert_eq!(ds.active().count(), 2);
        assert_eq!(ds.group(by_name).get(&Key::from("alpha")).unwrap().sum, 10.0);
        assert_eq!(ds.group(by_name).get(&Key::from("gamma")).unwrap().sum, 40.0);
        // beta's only record is filtered out but its bucket stays
        assert_eq!(
            ds.group(by_name).get(&Key::from("beta")),
            Some(&Aggregate { count: 0, sum: 0.0 })
        );

        ds.clear_filter(tod);
        assert_eq!(ds.active().count(), 4);
        assert_eq!(ds.group(by_name).get(&Key::from("alpha")).unwrap().sum, 40.0);
    }

    #[test]
    fn groups_observe_their_own_dimension_filter() {
        let records = make_records(&[(0, 1, 1, 0), (1, 1, 1, 0), (2, 1, 1, 0)]);
        let mut ds = Dataset::new(records);
        let weekday = ds.add_dimension(DimensionKind::Weekday);
        let group = ds.add_group(weekday);

        ds.filter_values(weekday, [Key::Ordinal(2)]);
        assert_eq!(ds.group(group).get(&Key::Ordinal(1)).unwrap().count, 0);
        assert_eq!(ds.group(group).get(&Key::Ordinal(2)).unwrap().count, 1);
        assert_eq!(ds.group(group).size(), 3);
    }

    #[test]
    fn group_added_after_filtering_starts_from_active_set() {
        let records = make_records(&[(0, 1, 5, 0), (0, 13, 7, 1)]);
        let mut ds = Dataset::new(records);
        let tod = ds.add_dimension(DimensionKind::TimeOfDay);
        ds.filter_values(tod, ["Afternoon"]);

        let name = ds.add_dimension(DimensionKind::Field("name".into()));
        let group = ds.add_group(name);
        assert_eq!(ds.group(group).get(&Key::from("alpha")).unwrap().count, 0);
        assert_eq!(ds.group(group).get(&Key::from("beta")).unwrap().count, 1);
    }

    #[test]
    fn reduce_swaps_aggregation_in_place() {
        let records = make_records(&[(0, 1, 5, 0), (0, 2, 7, 0)]);
        let mut ds = Dataset::new(records);
        let name = ds.add_dimension(DimensionKind::Field("name".into()));
        let group = ds.add_group(name);

        assert_eq!(ds.group(group).get(&Key::from("alpha")).unwrap().sum, 0.0);
        ds.reduce(group, Reducer::sum("value"));
        assert_eq!(ds.group(group).get(&Key::from("alpha")).unwrap().sum, 12.0);
        ds.reduce(group, Reducer::Count);
        assert_eq!(
            ds.group(group).get(&Key::from("alpha")),
            Some(&Aggregate { count: 2, sum: 0.0 })
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        WeekdayRange(u32, u32),
        TimeOfDay(u8),
        Names(u8),
        ClearWeekday,
        ClearTimeOfDay,
        ClearNames,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..9, 1u32..9).prop_map(|(a, b)| Op::WeekdayRange(a, b)),
            any::<u8>().prop_map(Op::TimeOfDay),
            any::<u8>().prop_map(Op::Names),
            Just(Op::ClearWeekday),
            Just(Op::ClearTimeOfDay),
            Just(Op::ClearNames),
        ]
    }

    fn masked<'a>(items: &'a [&'a str], mask: u8) -> Vec<&'a str> {
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, s)| *s)
            .collect()
    }

    proptest! {
        #[test]
        fn incremental_matches_full_recompute(
            rows in prop::collection::vec((0i64..60, 0i64..24, -50i32..50, 0usize..4), 1..60),
            ops in prop::collection::vec(op(), 1..20),
        ) {
            let mut ds = Dataset::new(make_records(&rows));
            let week = ds.add_dimension(DimensionKind::Week);
            let weekday = ds.add_dimension(DimensionKind::Weekday);
            let tod = ds.add_dimension(DimensionKind::TimeOfDay);
            let name = ds.add_dimension(DimensionKind::Field("name".into()));

            let timeline = ds.add_group(week);
            let by_tod = ds.add_group(tod);
            let by_name = ds.add_group(name);
            let by_weekday = ds.add_group(weekday);
            ds.reduce(timeline, Reducer::sum("value"));
            ds.reduce(by_name, Reducer::sum("value"));

            let parts = ["Night", "Morning", "Afternoon", "Evening"];
            for op in ops {
                match op {
                    Op::WeekdayRange(lo, hi) => ds.filter_range(weekday, Key::Ordinal(lo), Key::Ordinal(hi)),
                    Op::TimeOfDay(mask) => ds.filter_values(tod, masked(&parts, mask)),
                    Op::Names(mask) => ds.filter_values(name, masked(&NAMES, mask)),
                    Op::ClearWeekday => ds.clear_filter(weekday),
                    Op::ClearTimeOfDay => ds.clear_filter(tod),
                    Op::ClearNames => ds.clear_filter(name),
                }

                for g in [timeline, by_tod, by_name, by_weekday] {
                    let group = ds.group(g);
                    prop_assert_eq!(snapshot(group), full_recompute(&ds, group));
                }
            }
        }
    }
}
