// Per-dimension selection of which scored rows are returned.

use crate::dataset::Record;
use crate::schema::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Values meaning "every value" when present in a selection.
const ALL_SENTINELS: &[&str] = &["all", "todos", "todas", "*"];

fn is_all_sentinel(value: &str) -> bool {
    let value = value.trim();
    ALL_SENTINELS
        .iter()
        .any(|sentinel| value.eq_ignore_ascii_case(sentinel))
}

/// Selected values per dimension.
///
/// An empty set, or a set containing an "all" sentinel, places no
/// restriction on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub period: BTreeSet<String>,
    #[serde(default)]
    pub player: BTreeSet<String>,
    #[serde(default)]
    pub category: BTreeSet<String>,
}

impl FilterSpec {
    pub fn with_periods<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.period.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_players<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.player.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_categories<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category.extend(values.into_iter().map(Into::into));
        self
    }

    /// The active selection for `field`, or `None` when unrestricted.
    pub fn selection(&self, field: Field) -> Option<&BTreeSet<String>> {
        let set = match field {
            Field::Player => &self.player,
            Field::Period => &self.period,
            Field::Category => &self.category,
            Field::MetricValue => return None,
        };
        if set.is_empty() || set.iter().any(|v| is_all_sentinel(v)) {
            None
        } else {
            Some(set)
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        [Field::Period, Field::Player, Field::Category]
            .into_iter()
            .all(|field| self.selection(field).is_none())
    }

    /// Whether `value` passes the selection on `field`. A missing value only
    /// passes an unrestricted dimension.
    pub fn allows(&self, field: Field, value: Option<&str>) -> bool {
        match self.selection(field) {
            None => true,
            Some(set) => value.is_some_and(|value| set.iter().any(|s| s.trim() == value)),
        }
    }

    pub fn allows_period(&self, period: &str) -> bool {
        self.allows(Field::Period, Some(period))
    }

    /// Whether a record passes every dimension.
    pub fn matches(&self, record: &Record) -> bool {
        [Field::Period, Field::Player, Field::Category]
            .into_iter()
            .all(|field| self.allows(field, record.dimension(field)))
    }
}
