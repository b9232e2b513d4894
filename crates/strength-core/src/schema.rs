// Canonical fields, the static alias table, and header resolution.
//
// Raw spreadsheet headers vary between sources ("RM SENTADILLA",
// "RM_SENTADILLA", "Sentadilla", ...). Every header is normalized once at load
// time and matched against the alias table, producing a `FieldPresence`
// report that the loader and the score engine both consult.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// A canonical column of the performance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Player,
    Period,
    Category,
    MetricValue,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Player,
        Field::Period,
        Field::Category,
        Field::MetricValue,
    ];

    /// Fields every loaded table must provide under some alias.
    pub const REQUIRED: [Field; 3] = [Field::Player, Field::Period, Field::MetricValue];

    pub fn canonical(self) -> &'static str {
        match self {
            Field::Player => "player",
            Field::Period => "period",
            Field::Category => "category",
            Field::MetricValue => "metric_value",
        }
    }

    /// Dimensions can be filtered and grouped on; only `MetricValue` is numeric.
    pub fn is_dimension(self) -> bool {
        !matches!(self, Field::MetricValue)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A required field could not be found under any accepted name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "missing column(s): {}; columns found: [{}]",
    .missing.join(", "),
    .found.join(", ")
)]
pub struct MissingColumnError {
    /// Every field that was requested but not found.
    pub missing: Vec<String>,
    /// The columns that were actually available.
    pub found: Vec<String>,
}

// ---------------------------------------------------------------------------
// Header normalization
// ---------------------------------------------------------------------------

/// Normalize a raw column name for alias matching.
///
/// Lowercases, folds Spanish accents, and collapses `_`, `-`, `.` and runs of
/// whitespace into a single space, so `RM_SENTADILLA` and ` rm  sentadilla `
/// both become `rm sentadilla`.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        let ch = fold_accent(ch);
        if ch.is_whitespace() || matches!(ch, '_' | '-' | '.') {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

const PLAYER_ALIASES: &[&str] = &[
    "player",
    "jugador",
    "jugadora",
    "nombre",
    "name",
    "athlete",
    "atleta",
    "deportista",
];

const PERIOD_ALIASES: &[&str] = &["period", "periodo", "mes", "month", "fecha"];

const CATEGORY_ALIASES: &[&str] = &["category", "categoria", "division", "grupo"];

const METRIC_ALIASES: &[&str] = &[
    "metric value",
    "metric",
    "value",
    "rm sentadilla",
    "sentadilla",
    "rm",
    "rm squat",
    "squat",
];

/// Static mapping `canonical field -> accepted raw names` (stored normalized).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<Field, BTreeSet<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = AliasTable {
            aliases: BTreeMap::new(),
        };
        for (field, names) in [
            (Field::Player, PLAYER_ALIASES),
            (Field::Period, PERIOD_ALIASES),
            (Field::Category, CATEGORY_ALIASES),
            (Field::MetricValue, METRIC_ALIASES),
        ] {
            table.extend(field, names.iter().copied());
            table.extend(field, [field.canonical()]);
        }
        table
    }
}

impl AliasTable {
    /// Add more accepted raw names for `field`.
    pub fn extend<I, S>(&mut self, field: Field, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.aliases.entry(field).or_default();
        for name in names {
            let normalized = normalize_name(name.as_ref());
            if !normalized.is_empty() {
                entry.insert(normalized);
            }
        }
    }

    /// Builder-style variant of [`AliasTable::extend`].
    pub fn with_aliases<I, S>(mut self, field: Field, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend(field, names);
        self
    }

    /// Accepted names for `field`, normalized.
    pub fn aliases(&self, field: Field) -> impl Iterator<Item = &str> {
        self.aliases
            .get(&field)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Map a raw name to its canonical field, if any alias matches.
    ///
    /// If user-supplied aliases make a name ambiguous, the first field in
    /// `Field::ALL` order wins.
    pub fn resolve(&self, raw: &str) -> Option<Field> {
        let normalized = normalize_name(raw);
        Field::ALL.into_iter().find(|field| {
            self.aliases
                .get(field)
                .is_some_and(|names| names.contains(&normalized))
        })
    }

    /// Resolve a header row into a field-presence report.
    pub fn resolve_headers(&self, headers: &[String]) -> FieldPresence {
        let mut columns = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            let Some(field) = self.resolve(header) else {
                continue;
            };
            match columns.get(&field) {
                Some(ResolvedColumn { header: first, .. }) => {
                    warn!(
                        "column '{}' also matches field '{}'; keeping first match '{}'",
                        header.trim(),
                        field,
                        first
                    );
                }
                None => {
                    columns.insert(
                        field,
                        ResolvedColumn {
                            header: header.trim().to_string(),
                            index,
                        },
                    );
                }
            }
        }
        FieldPresence {
            columns,
            found: headers.iter().map(|h| h.trim().to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Field presence report
// ---------------------------------------------------------------------------

/// The raw header a canonical field was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub header: String,
    pub index: usize,
}

/// Which canonical fields a table provides, and under which raw headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPresence {
    columns: BTreeMap<Field, ResolvedColumn>,
    found: Vec<String>,
}

impl FieldPresence {
    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn column(&self, field: Field) -> Option<&ResolvedColumn> {
        self.columns.get(&field)
    }

    /// Every raw header of the source table, in order.
    pub fn found(&self) -> &[String] {
        &self.found
    }

    /// Fail with every field in `fields` that did not resolve.
    pub fn require(&self, fields: &[Field]) -> Result<(), MissingColumnError> {
        let missing: Vec<String> = fields
            .iter()
            .filter(|field| !self.has(**field))
            .map(|field| field.canonical().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingColumnError {
                missing,
                found: self.found.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
