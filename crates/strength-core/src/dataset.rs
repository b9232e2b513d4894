// Performance table loading and normalization.
//
// Reads a CSV export of the strength spreadsheet, resolves its headers through
// the alias table and keeps only rows with a player, a period and a numeric
// metric value.

use crate::schema::{AliasTable, Field, FieldPresence, MissingColumnError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One measurement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub player: String,
    pub period: String,
    pub category: Option<String>,
    pub metric_value: f64,
}

impl Record {
    /// Text value of a dimension field. `None` for the metric or a missing category.
    pub fn dimension(&self, field: Field) -> Option<&str> {
        match field {
            Field::Player => Some(&self.player),
            Field::Period => Some(&self.period),
            Field::Category => self.category.as_deref(),
            Field::MetricValue => None,
        }
    }
}

/// An immutable, normalized set of records plus the schema it was read with.
///
/// The alias table travels with the dataset so later lookups by column name
/// accept the same spellings the loader did.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub schema: FieldPresence,
    pub aliases: AliasTable,
}

impl Dataset {
    pub fn new(records: Vec<Record>, schema: FieldPresence, aliases: AliasTable) -> Self {
        Dataset {
            records,
            schema,
            aliases,
        }
    }

    /// Build a dataset from already-typed records, with every canonical field present.
    pub fn from_records(records: Vec<Record>) -> Self {
        let aliases = AliasTable::default();
        let headers: Vec<String> = Field::ALL
            .iter()
            .map(|field| field.canonical().to_string())
            .collect();
        let schema = aliases.resolve_headers(&headers);
        Dataset::new(records, schema, aliases)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Untyped rows as they come out of the spreadsheet export.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("data resource not found: {}", .path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("{} is a directory; a sheet name is required to pick a table", .path.display())]
    SheetRequired { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error(transparent)]
    MissingColumn(#[from] MissingColumnError),
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// Spreadsheet spellings of an empty cell.
const NULL_MARKERS: &[&str] = &["", "nan", "na", "n/a", "null", "none", "-"];

fn cell(row: &[Option<String>], index: usize) -> Option<String> {
    row.get(index).and_then(|c| c.as_deref()).and_then(clean_cell)
}

fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if NULL_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a metric cell. Accepts `.` or a lone `,` as decimal separator.
pub fn parse_metric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let lone_comma = trimmed.matches(',').count() == 1 && !trimmed.contains('.');
    let candidate = if lone_comma {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    candidate.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Resolve headers and build a dataset, dropping incomplete rows.
///
/// Fails only when a required field has no matching column.
pub fn normalize(table: &RawTable, aliases: &AliasTable) -> Result<Dataset, MissingColumnError> {
    let schema = aliases.resolve_headers(&table.headers);
    schema.require(&Field::REQUIRED)?;

    let column = |field: Field| -> Result<usize, MissingColumnError> {
        schema
            .column(field)
            .map(|c| c.index)
            .ok_or_else(|| MissingColumnError {
                missing: vec![field.canonical().to_string()],
                found: schema.found().to_vec(),
            })
    };
    let player_col = column(Field::Player)?;
    let period_col = column(Field::Period)?;
    let metric_col = column(Field::MetricValue)?;
    let category_col = column(Field::Category).ok();

    let mut records = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;
    for (line, row) in table.rows.iter().enumerate() {
        let player = cell(row, player_col);
        let period = cell(row, period_col);
        let metric_raw = cell(row, metric_col);
        let metric = metric_raw.as_deref().and_then(parse_metric);
        if metric.is_none() {
            if let Some(raw) = &metric_raw {
                debug!("row {}: metric value '{}' is not a number", line + 1, raw);
            }
        }
        match (player, period, metric) {
            (Some(player), Some(period), Some(metric_value)) => records.push(Record {
                player,
                period,
                category: category_col.and_then(|index| cell(row, index)),
                metric_value,
            }),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        info!(
            "dropped {} of {} rows with a missing player, period or metric value",
            dropped,
            table.rows.len()
        );
    }

    Ok(Dataset::new(records, schema, aliases.clone()))
}

// ---------------------------------------------------------------------------
// Reader-based loader (enables testing without temp files)
// ---------------------------------------------------------------------------

pub fn load_table_from_reader<R: Read>(rdr: R) -> Result<RawTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => {
                rows.push(record.iter().map(|c| Some(c.to_string())).collect());
            }
            Err(e) => {
                warn!("skipping malformed row: {}", e);
            }
        }
    }
    Ok(RawTable { headers, rows })
}

// ---------------------------------------------------------------------------
// Path-based loader
// ---------------------------------------------------------------------------

/// Locate the table file: `path` itself, or `<path>/<sheet>.csv` for a directory.
pub fn resolve_table_path(path: &Path, sheet: Option<&str>) -> Result<PathBuf, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::ResourceNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let Some(sheet) = sheet else {
        return Err(DatasetError::SheetRequired {
            path: path.to_path_buf(),
        });
    };
    let table_path = path.join(format!("{sheet}.csv"));
    if table_path.is_file() {
        Ok(table_path)
    } else {
        Err(DatasetError::ResourceNotFound { path: table_path })
    }
}

/// Read and normalize the table at `path` (see [`resolve_table_path`]).
pub fn load_dataset(
    path: &Path,
    sheet: Option<&str>,
    aliases: &AliasTable,
) -> Result<Dataset, DatasetError> {
    let table_path = resolve_table_path(path, sheet)?;
    let file = std::fs::File::open(&table_path).map_err(|e| DatasetError::Io {
        path: table_path.clone(),
        source: e,
    })?;
    let table = load_table_from_reader(file).map_err(|e| DatasetError::Csv {
        path: table_path.clone(),
        source: e,
    })?;
    let dataset = normalize(&table, aliases)?;
    info!(
        "loaded {} records from {} (category column: {})",
        dataset.len(),
        table_path.display(),
        if dataset.schema.has(Field::Category) { "yes" } else { "no" }
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
