// Calendar ordering for period labels.
//
// Periods are free-text month labels ("ENERO", "Feb", "marzo 2024"). Labels
// that name a month sort in calendar order; anything else sorts lexically
// after them.

use crate::schema::normalize_name;
use std::cmp::Ordering;

const MONTHS: &[(&[&str], u8)] = &[
    (&["enero", "ene", "january", "jan"], 1),
    (&["febrero", "feb", "february"], 2),
    (&["marzo", "mar", "march"], 3),
    (&["abril", "abr", "april", "apr"], 4),
    (&["mayo", "may"], 5),
    (&["junio", "jun", "june"], 6),
    (&["julio", "jul", "july"], 7),
    (&["agosto", "ago", "august", "aug"], 8),
    (&["septiembre", "setiembre", "sep", "sept", "set", "september"], 9),
    (&["octubre", "oct", "october"], 10),
    (&["noviembre", "nov", "november"], 11),
    (&["diciembre", "dic", "december", "dec"], 12),
];

/// Sort key for a period label that names a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeriodKey {
    pub year: Option<i32>,
    pub month: u8,
}

/// Month number (1-12) for a bare month name, Spanish or English.
pub fn month_index(name: &str) -> Option<u8> {
    let normalized = normalize_name(name);
    MONTHS
        .iter()
        .find(|(names, _)| names.contains(&normalized.as_str()))
        .map(|(_, month)| *month)
}

/// Parse labels like `ENERO`, `ene 2024` or `2024 January`.
pub fn period_key(label: &str) -> Option<PeriodKey> {
    let normalized = normalize_name(label);
    let mut month = None;
    let mut year = None;
    for token in normalized.split(' ') {
        if month.is_none() {
            if let Some(m) = month_index(token) {
                month = Some(m);
                continue;
            }
        }
        if year.is_none() && token.len() == 4 {
            if let Ok(y) = token.parse::<i32>() {
                year = Some(y);
                continue;
            }
        }
        // Any unrecognized token means this is not a plain month label.
        return None;
    }
    month.map(|month| PeriodKey { year, month })
}

/// Total order over period labels: calendar months first, then lexical.
pub fn compare_periods(a: &str, b: &str) -> Ordering {
    match (period_key(a), period_key(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => normalize_name(a)
            .cmp(&normalize_name(b))
            .then_with(|| a.cmp(b)),
    }
}
