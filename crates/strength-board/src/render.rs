// Plain-text and JSON rendering of scored rows.
//
// Rendering never computes anything: rows arrive sorted and scored from the
// engine and are written out as-is.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use strength_core::config::OutputFormat;
use strength_core::schema::Field;
use strength_core::scoring::{FilterSpec, ScoreRequest, ScoredRecord};

/// Shown instead of an empty table.
pub const NO_DATA: &str = "No data for the selected filters.";

const HEADERS: [&str; 7] = ["Player", "Period", "Category", "Value", "Z", "T", "n"];

/// Context printed above the table.
#[derive(Debug, Clone)]
pub struct Caption<'a> {
    pub request: &'a ScoreRequest,
    pub loaded_at: Option<DateTime<Utc>>,
}

pub fn render(
    out: &mut impl Write,
    format: OutputFormat,
    caption: &Caption<'_>,
    rows: &[ScoredRecord],
) -> io::Result<()> {
    match format {
        OutputFormat::Table => render_table(out, caption, rows),
        OutputFormat::Json => render_json(out, rows),
    }
}

fn render_json(out: &mut impl Write, rows: &[ScoredRecord]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, rows)?;
    writeln!(out)
}

fn render_table(out: &mut impl Write, caption: &Caption<'_>, rows: &[ScoredRecord]) -> io::Result<()> {
    writeln!(out, "{}", caption_line(caption))?;
    if rows.is_empty() {
        writeln!(out, "{NO_DATA}")?;
        return Ok(());
    }

    let cells: Vec<[String; 7]> = rows.iter().map(row_cells).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_line(out, &HEADERS.map(String::from), &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("  "))?;
    for row in &cells {
        write_line(out, row, &widths)?;
    }
    Ok(())
}

fn row_cells(row: &ScoredRecord) -> [String; 7] {
    [
        row.player.clone(),
        row.period.clone(),
        row.category.clone().unwrap_or_else(|| "-".into()),
        format!("{:.1}", row.metric_value),
        format!("{:+.3}", row.z_score),
        format!("{:.1}", row.t_score),
        row.records.to_string(),
    ]
}

/// Text columns are left-aligned, numeric columns right-aligned.
fn write_line(out: &mut impl Write, cells: &[String; 7], widths: &[usize; 7]) -> io::Result<()> {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, &width))| {
            if i < 3 {
                format!("{cell:<width$}")
            } else {
                format!("{cell:>width$}")
            }
        })
        .collect();
    writeln!(out, "{}", padded.join("  ").trim_end())
}

fn caption_line(caption: &Caption<'_>) -> String {
    let request = caption.request;
    let mut line = format!(
        "T-scores for {} | reference: {} | filter: {}",
        request.metric_field,
        request.reference_policy,
        describe_filter(&request.filter)
    );
    if let Some(group) = &request.group_field {
        line.push_str(&format!(" | grouped by {group}"));
    }
    if let Some(at) = caption.loaded_at {
        line.push_str(&format!(" | loaded {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    line
}

fn describe_filter(filter: &FilterSpec) -> String {
    [Field::Period, Field::Player, Field::Category]
        .into_iter()
        .map(|field| match filter.selection(field) {
            None => format!("{field}=all"),
            Some(values) => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                format!("{field}={}", values.join(","))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
