use std::collections::BTreeSet;

use super::model::Key;

// ---------------------------------------------------------------------------
// Filter predicate of a single dimension
// ---------------------------------------------------------------------------

/// The predicate a dimension contributes to the dataset's active set.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No constraint.
    #[default]
    All,
    /// Half-open key range `[lo, hi)`.
    Range { lo: Key, hi: Key },
    /// Discrete membership. An empty set selects nothing.
    Values(BTreeSet<Key>),
}

impl Filter {
    pub fn range(lo: impl Into<Key>, hi: impl Into<Key>) -> Self {
        Filter::Range {
            lo: lo.into(),
            hi: hi.into(),
        }
    }

    pub fn values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Filter::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    /// Whether a record whose bucket key is `key` passes.
    ///
    /// A record without a key only passes the unconstrained filter.
    pub fn matches(&self, key: Option<&Key>) -> bool {
        match (self, key) {
            (Filter::All, _) => true,
            (_, None) => false,
            (Filter::Range { lo, hi }, Some(k)) => lo <= k && k < hi,
            (Filter::Values(set), Some(k)) => set.contains(k),
        }
    }
}
