//! Incrementally maintained bucket aggregates.
//!
//! A [`Group`] maps every key its dimension has ever produced to an
//! [`Aggregate`]. The dataset calls [`Group::add`] / [`Group::remove`] for the
//! records entering or leaving the active set, so a filter change costs
//! O(changed records). Buckets are never dropped: a bucket whose records were
//! all filtered out stays in [`Group::all`] with the reducer's identity value
//! (or a float residue close to it).

use std::collections::BTreeMap;

use crate::data::dataset::{ActiveSet, DimensionId};
use crate::data::dimension::Dimension;
use crate::data::model::{Key, Record};

// ---------------------------------------------------------------------------
// Aggregate and reducers
// ---------------------------------------------------------------------------

/// Per-bucket accumulator shared by all built-in reducers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aggregate {
    pub count: i64,
    pub sum: f64,
}

/// The closed set of invertible reducers.
///
/// `remove(add(acc, r), r) == acc` holds exactly for `Count` and up to float
/// rounding for `Sum`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Reducer {
    /// Tally of records.
    #[default]
    Count,
    /// Sum of a numeric field, tallying records alongside.
    Sum { field: String },
}

impl Reducer {
    pub fn sum(field: impl Into<String>) -> Self {
        Reducer::Sum {
            field: field.into(),
        }
    }

    pub fn initial(&self) -> Aggregate {
        Aggregate::default()
    }

    pub fn add(&self, mut acc: Aggregate, record: &Record) -> Aggregate {
        acc.count += 1;
        if let Reducer::Sum { field } = self {
            acc.sum += record.number(field);
        }
        acc
    }

    pub fn remove(&self, mut acc: Aggregate, record: &Record) -> Aggregate {
        acc.count -= 1;
        if let Reducer::Sum { field } = self {
            acc.sum -= record.number(field);
        }
        acc
    }
}

/// Projection from an aggregate to the number that is displayed and ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueAccessor {
    #[default]
    Count,
    Sum,
}

impl ValueAccessor {
    pub fn value(self, agg: &Aggregate) -> f64 {
        match self {
            ValueAccessor::Count => agg.count as f64,
            ValueAccessor::Sum => agg.sum,
        }
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Group {
    dimension: DimensionId,
    reducer: Reducer,
    order: ValueAccessor,
    metric_name: String,
    buckets: BTreeMap<Key, Aggregate>,
}

impl Group {
    /// Create a bucket for every key of `dim` and fold in the active records.
    pub(crate) fn build(
        dimension: DimensionId,
        dim: &Dimension,
        records: &[Record],
        active: &ActiveSet,
        reducer: Reducer,
    ) -> Self {
        let mut group = Self {
            dimension,
            reducer,
            order: ValueAccessor::default(),
            metric_name: String::new(),
            buckets: BTreeMap::new(),
        };
        group.recompute(dim, records, active);
        group
    }

    /// Swap the reducer and rebuild every bucket from the active set.
    pub(crate) fn rebuild(
        &mut self,
        reducer: Reducer,
        dim: &Dimension,
        records: &[Record],
        active: &ActiveSet,
    ) {
        self.reducer = reducer;
        self.recompute(dim, records, active);
    }

    fn recompute(&mut self, dim: &Dimension, records: &[Record], active: &ActiveSet) {
        let initial = self.reducer.initial();
        self.buckets = dim.keys().map(|k| (k.clone(), initial)).collect();
        for (i, record) in records.iter().enumerate() {
            if !active.is_active(i) {
                continue;
            }
            if let Some(key) = dim.key_of(i) {
                self.add(key, record);
            }
        }
    }

    pub(crate) fn add(&mut self, key: &Key, record: &Record) {
        let reducer = &self.reducer;
        let acc = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| reducer.initial());
        *acc = reducer.add(*acc, record);
    }

    pub(crate) fn remove(&mut self, key: &Key, record: &Record) {
        let reducer = &self.reducer;
        let acc = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| reducer.initial());
        *acc = reducer.remove(*acc, record);
    }

    pub fn dimension(&self) -> DimensionId {
        self.dimension
    }

    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    pub fn order(&self) -> ValueAccessor {
        self.order
    }

    pub fn set_order(&mut self, order: ValueAccessor) {
        self.order = order;
    }

    /// Display name of the metric currently reduced by this group.
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn set_metric_name(&mut self, name: impl Into<String>) {
        self.metric_name = name.into();
    }

    /// Every bucket in key order, including ghost buckets.
    pub fn all(&self) -> impl Iterator<Item = (&Key, &Aggregate)> {
        self.buckets.iter()
    }

    /// Every bucket in key order projected through the ordering accessor.
    pub fn values(&self) -> Vec<(Key, f64)> {
        self.buckets
            .iter()
            .map(|(k, agg)| (k.clone(), self.order.value(agg)))
            .collect()
    }

    pub fn get(&self, key: &Key) -> Option<&Aggregate> {
        self.buckets.get(key)
    }

    /// Number of buckets.
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    /// The `k` buckets with the highest ordering value, descending.
    ///
    /// Ties keep key order. Ghost buckets are not suppressed here; see
    /// [`crate::query::top_entries`].
    pub fn top(&self, k: usize) -> Vec<(&Key, &Aggregate)> {
        let mut entries: Vec<(&Key, &Aggregate)> = self.buckets.iter().collect();
        let order = self.order;
        entries.sort_by(|a, b| order.value(b.1).total_cmp(&order.value(a.1)));
        entries.truncate(k);
        entries
    }
}
