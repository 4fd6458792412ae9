//! Named time ranges applied to the primary time dimension.

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};

use crate::data::dimension::week_start;
use crate::error::{DashboardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for RangeUnit {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(RangeUnit::Day),
            "week" => Ok(RangeUnit::Week),
            "month" => Ok(RangeUnit::Month),
            "year" => Ok(RangeUnit::Year),
            other => Err(DashboardError::InvalidRangeUnit(other.to_string())),
        }
    }
}

/// A named `[start, end)` time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Range {
    pub fn new(name: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }
}

/// Last millisecond of the ISO week containing `t` (Sunday 23:59:59.999).
///
/// `None` at the edges of the representable range.
pub fn end_of_week(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    week_start(t)?
        .checked_add_signed(Duration::weeks(1))?
        .checked_sub_signed(Duration::milliseconds(1))
}

/// A trailing window of `amount` units ending at `now`.
///
/// Except for days, the window end is pushed to the end of the current ISO
/// week so that weekly buckets are never cut.
pub fn compute_range(now: DateTime<Utc>, amount: u32, unit: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let unit: RangeUnit = unit.parse()?;
    let end = match unit {
        RangeUnit::Day => now,
        _ => end_of_week(now).unwrap_or(now),
    };
    let start = match unit {
        RangeUnit::Day => end
            .checked_sub_signed(Duration::days(i64::from(amount)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        RangeUnit::Week => end
            .checked_sub_signed(Duration::weeks(i64::from(amount)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        RangeUnit::Month => end
            .checked_sub_months(Months::new(amount))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        RangeUnit::Year => end
            .checked_sub_months(Months::new(amount.saturating_mul(12)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
    };
    Ok((start, end))
}

/// "All time" from the first record to now, then the last two and one years.
pub fn default_ranges(first: DateTime<Utc>, now: DateTime<Utc>) -> Result<Vec<Range>> {
    let (two_start, two_end) = compute_range(now, 2, "year")?;
    let (one_start, one_end) = compute_range(now, 1, "year")?;
    Ok(vec![
        Range::new("All time", first, now),
        Range::new("2 years", two_start, two_end),
        Range::new("1 year", one_start, one_end),
    ])
}
