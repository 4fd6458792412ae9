use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};

use super::filter::Filter;
use super::model::{Key, Record};

// ---------------------------------------------------------------------------
// Key functions
// ---------------------------------------------------------------------------

/// The closed set of key functions a dimension can be built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionKind {
    /// The record timestamp itself.
    Time,
    /// Start of the record's ISO week (Monday 00:00).
    Week,
    /// ISO weekday, 1 = Monday … 7 = Sunday.
    Weekday,
    /// Coarse part of the day; hour 23 has no bucket.
    TimeOfDay,
    /// Text of an arbitrary record field.
    Field(String),
}

impl DimensionKind {
    /// Bucket key of a record. Pure; `None` means the record has no bucket.
    pub fn bucket(&self, record: &Record) -> Option<Key> {
        match self {
            DimensionKind::Time => Some(Key::Time(record.t)),
            DimensionKind::Week => week_start(record.t).map(Key::Time),
            DimensionKind::Weekday => Some(Key::Ordinal(record.t.weekday().number_from_monday())),
            DimensionKind::TimeOfDay => time_of_day(record.t.hour()).map(Key::from),
            DimensionKind::Field(name) => record.text(name).map(Key::Text),
        }
    }
}

/// Truncate a timestamp to Monday 00:00 of its ISO week.
///
/// `None` when that Monday falls before the earliest representable date.
pub fn week_start(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = t.date_naive();
    let monday = date.checked_sub_signed(Duration::days(i64::from(
        date.weekday().num_days_from_monday(),
    )))?;
    Some(Utc.from_utc_datetime(&monday.and_time(NaiveTime::default())))
}

/// Part of the day for an hour in `0..24`.
///
/// The evening bucket stops at 23:00, so records from the last hour of the
/// day are left out of this breakdown.
pub fn time_of_day(hour: u32) -> Option<&'static str> {
    if hour < 6 {
        Some("Night")
    } else if hour < 12 {
        Some("Morning")
    } else if hour < 18 {
        Some("Afternoon")
    } else if hour < 23 {
        Some("Evening")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Dimension – keyed index over the dataset
// ---------------------------------------------------------------------------

/// A key projection of the dataset with its current filter.
///
/// Records are indexed by key so a filter change only visits the keys whose
/// membership can differ between the old and the new predicate.
#[derive(Debug, Clone)]
pub struct Dimension {
    kind: DimensionKind,
    keys: Vec<Option<Key>>,
    index: BTreeMap<Key, Vec<usize>>,
    unkeyed: Vec<usize>,
    filter: Filter,
}

impl Dimension {
    pub fn build(kind: DimensionKind, records: &[Record]) -> Self {
        let keys: Vec<Option<Key>> = records.iter().map(|r| kind.bucket(r)).collect();

        let mut index: BTreeMap<Key, Vec<usize>> = BTreeMap::new();
        let mut unkeyed = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            match key {
                Some(k) => index.entry(k.clone()).or_default().push(i),
                None => unkeyed.push(i),
            }
        }

        Self {
            kind,
            keys,
            index,
            unkeyed,
            filter: Filter::All,
        }
    }

    pub fn kind(&self) -> &DimensionKind {
        &self.kind
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Cached bucket key of record `i`.
    pub fn key_of(&self, i: usize) -> Option<&Key> {
        self.keys.get(i).and_then(Option::as_ref)
    }

    /// Distinct keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.index.keys()
    }

    /// Smallest key, i.e. the bottom of the dimension.
    pub fn first_key(&self) -> Option<&Key> {
        self.index.keys().next()
    }

    /// Records whose pass/fail status differs between the current filter and
    /// `next`. Only candidate keys are visited.
    pub(crate) fn flipped_records(&self, next: &Filter) -> Vec<usize> {
        let current = &self.filter;
        let mut flipped = Vec::new();

        for key in self.candidate_keys(current, next) {
            if current.matches(Some(key)) != next.matches(Some(key)) {
                if let Some(records) = self.index.get(key) {
                    flipped.extend_from_slice(records);
                }
            }
        }
        if current.is_all() != next.is_all() {
            flipped.extend_from_slice(&self.unkeyed);
        }
        flipped
    }

    pub(crate) fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Keys that may change membership between `a` and `b`.
    fn candidate_keys<'a>(&'a self, a: &Filter, b: &Filter) -> Vec<&'a Key> {
        match (a, b) {
            (Filter::All, Filter::All) => Vec::new(),
            (Filter::All, f) | (f, Filter::All) => self.excluded_keys(f),
            (a, b) => {
                let mut keys = self.included_keys(a);
                keys.extend(self.included_keys(b));
                keys.sort();
                keys.dedup();
                keys
            }
        }
    }

    fn included_keys<'a>(&'a self, filter: &Filter) -> Vec<&'a Key> {
        match filter {
            Filter::All => self.index.keys().collect(),
            Filter::Range { lo, hi } if lo < hi => self
                .index
                .range((Bound::Included(lo), Bound::Excluded(hi)))
                .map(|(k, _)| k)
                .collect(),
            Filter::Range { .. } => Vec::new(),
            Filter::Values(set) => set
                .iter()
                .filter_map(|k| self.index.get_key_value(k).map(|(k, _)| k))
                .collect(),
        }
    }

    fn excluded_keys<'a>(&'a self, filter: &Filter) -> Vec<&'a Key> {
        match filter {
            Filter::All => Vec::new(),
            Filter::Range { lo, hi } if lo < hi => self
                .index
                .range((Bound::Unbounded, Bound::Excluded(lo)))
                .chain(self.index.range((Bound::Included(hi), Bound::Unbounded)))
                .map(|(k, _)| k)
                .collect(),
            Filter::Range { .. } => self.index.keys().collect(),
            Filter::Values(set) => self.index.keys().filter(|k| !set.contains(*k)).collect(),
        }
    }
}
