//! Ranked reads over groups, and display formatting of metric values.

use crate::data::model::Key;
use crate::group::Group;

/// Ranked reads treat aggregates with `|v| <= GHOST_THRESHOLD` as absent.
pub const GHOST_THRESHOLD: f64 = 1e-5;

/// One ranked bucket with its displayed value.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub key: Key,
    pub value: f64,
}

/// The `k` highest buckets of `group` by its ordering, ghost buckets dropped.
///
/// Suppression happens after taking the top `k`, so fewer than `k` entries
/// may come back even when more non-empty buckets exist further down.
pub fn top_entries(group: &Group, k: usize) -> Vec<RankedEntry> {
    let order = group.order();
    group
        .top(k)
        .into_iter()
        .map(|(key, agg)| RankedEntry {
            key: key.clone(),
            value: order.value(agg),
        })
        .filter(|e| e.value.abs() > GHOST_THRESHOLD)
        .collect()
}

/// A formatted row of the ranked table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub value: String,
    pub key: String,
}

/// Round to an integer and group digits by three, e.g. `1234567.4` →
/// `"1 234 567"`.
pub fn format_value(value: f64) -> String {
    let digits = format!("{}", value.round() as i64);
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits.as_str()),
    };

    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 + 1);
    out.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}
