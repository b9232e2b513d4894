// Score engine: reference populations, per-record Z/T-scores, aggregation
// and ordering.

use crate::dataset::{Dataset, Record};
use crate::period::compare_periods;
use crate::schema::{normalize_name, Field, MissingColumnError};
use crate::scoring::filter::FilterSpec;
use crate::scoring::stats::{compute_pool_stats, compute_zscore, t_score_from_z, PoolStats};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Which records form the baseline a record is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// The whole dataset, regardless of any filter.
    Global,
    /// Every record sharing the scored record's period.
    #[default]
    PerPeriod,
    /// Every record in the periods the filter selects, pooled together.
    /// Player and category selections never narrow it.
    SelectedPeriods,
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferencePolicy::Global => "global",
            ReferencePolicy::PerPeriod => "per_period",
            ReferencePolicy::SelectedPeriods => "selected_periods",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// The group value when aggregating, otherwise period then player.
    #[default]
    Group,
    Player,
    Period,
    Category,
    MetricValue,
    ZScore,
    TScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortPolicy {
    #[serde(default)]
    pub key: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortPolicy {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        SortPolicy { key, direction }
    }
}

/// Everything `compute_scores` needs besides the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    /// Column to standardize, by canonical name or any accepted alias.
    pub metric_field: String,
    /// Dimension to aggregate by; `None` returns one row per record.
    pub group_field: Option<String>,
    pub filter: FilterSpec,
    pub reference_policy: ReferencePolicy,
    pub sort: SortPolicy,
}

impl Default for ScoreRequest {
    fn default() -> Self {
        ScoreRequest {
            metric_field: Field::MetricValue.canonical().to_string(),
            group_field: None,
            filter: FilterSpec::default(),
            reference_policy: ReferencePolicy::default(),
            sort: SortPolicy::default(),
        }
    }
}

impl ScoreRequest {
    pub fn new(metric_field: impl Into<String>, reference_policy: ReferencePolicy) -> Self {
        ScoreRequest {
            metric_field: metric_field.into(),
            reference_policy,
            ..ScoreRequest::default()
        }
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_field = Some(field.into());
        self
    }

    pub fn filtered(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn sorted(mut self, sort: SortPolicy) -> Self {
        self.sort = sort;
        self
    }
}

// ---------------------------------------------------------------------------
// Output type
// ---------------------------------------------------------------------------

/// A record (or an aggregate of records) with its standardized scores.
///
/// `t_score` is always exactly `z_score * 10 + 50`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub player: String,
    pub period: String,
    pub category: Option<String>,
    pub metric_value: f64,
    pub z_score: f64,
    pub t_score: f64,
    /// Number of underlying records: 1 unless aggregated.
    pub records: usize,
}

impl ScoredRecord {
    fn from_record(record: &Record, stats: &PoolStats) -> Self {
        let z_score = compute_zscore(record.metric_value, stats);
        ScoredRecord {
            player: record.player.clone(),
            period: record.period.clone(),
            category: record.category.clone(),
            metric_value: record.metric_value,
            z_score,
            t_score: t_score_from_z(z_score),
            records: 1,
        }
    }

    pub fn dimension(&self, field: Field) -> Option<&str> {
        match field {
            Field::Player => Some(&self.player),
            Field::Period => Some(&self.period),
            Field::Category => self.category.as_deref(),
            Field::MetricValue => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// The role a requested field was asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Metric,
    Group,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldRole::Metric => "numeric metric",
            FieldRole::Group => "grouping dimension",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error(transparent)]
    MissingColumn(#[from] MissingColumnError),

    #[error("column `{field}` cannot be used as the {role}")]
    InvalidField { field: String, role: FieldRole },
}

// ---------------------------------------------------------------------------
// Reference statistics
// ---------------------------------------------------------------------------

/// The baseline statistics a scoring run uses.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceStats {
    /// One population for every record.
    Pooled(PoolStats),
    /// One population per period label.
    PerPeriod(BTreeMap<String, PoolStats>),
}

impl ReferenceStats {
    /// Stats for a record in `period`. A period with no population gets
    /// empty (degenerate) stats.
    pub fn for_period(&self, period: &str) -> PoolStats {
        match self {
            ReferenceStats::Pooled(stats) => *stats,
            ReferenceStats::PerPeriod(by_period) => {
                by_period.get(period).copied().unwrap_or_default()
            }
        }
    }
}

/// Compute the reference statistics for `policy`.
///
/// Only the period dimension of `filter` is consulted, and only by
/// `SelectedPeriods`.
pub fn reference_stats(
    dataset: &Dataset,
    filter: &FilterSpec,
    policy: ReferencePolicy,
) -> ReferenceStats {
    match policy {
        ReferencePolicy::Global => {
            let values: Vec<f64> = dataset.records.iter().map(|r| r.metric_value).collect();
            ReferenceStats::Pooled(compute_pool_stats(&values))
        }
        ReferencePolicy::SelectedPeriods => {
            let values: Vec<f64> = dataset
                .records
                .iter()
                .filter(|r| filter.allows_period(&r.period))
                .map(|r| r.metric_value)
                .collect();
            ReferenceStats::Pooled(compute_pool_stats(&values))
        }
        ReferencePolicy::PerPeriod => {
            let mut partitions: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            for record in &dataset.records {
                partitions
                    .entry(record.period.as_str())
                    .or_default()
                    .push(record.metric_value);
            }
            ReferenceStats::PerPeriod(
                partitions
                    .into_iter()
                    .map(|(period, values)| (period.to_string(), compute_pool_stats(&values)))
                    .collect(),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

fn resolve_field(dataset: &Dataset, name: &str) -> Result<Field, MissingColumnError> {
    match dataset.aliases.resolve(name) {
        Some(field) if dataset.schema.has(field) => Ok(field),
        _ => Err(MissingColumnError {
            missing: vec![name.trim().to_string()],
            found: dataset.schema.found().to_vec(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GroupAccumulator {
    players: Vec<String>,
    periods: Vec<String>,
    categories: Vec<String>,
    metric_sum: f64,
    z_sum: f64,
    count: usize,
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

impl GroupAccumulator {
    fn add(&mut self, row: &ScoredRecord) {
        push_distinct(&mut self.players, &row.player);
        push_distinct(&mut self.periods, &row.period);
        if let Some(category) = &row.category {
            push_distinct(&mut self.categories, category);
        }
        self.metric_sum += row.metric_value;
        self.z_sum += row.z_score;
        self.count += 1;
    }

    fn finish(self) -> ScoredRecord {
        let n = self.count as f64;
        let z_score = self.z_sum / n;
        ScoredRecord {
            player: self.players.join(", "),
            period: self.periods.join(", "),
            category: if self.categories.is_empty() {
                None
            } else {
                Some(self.categories.join(", "))
            },
            metric_value: self.metric_sum / n,
            z_score,
            t_score: t_score_from_z(z_score),
            records: self.count,
        }
    }
}

/// Collapse rows sharing a value of `group` into their arithmetic mean.
/// Groups appear in first-seen order.
fn aggregate(rows: &[ScoredRecord], group: Field) -> Vec<ScoredRecord> {
    let mut index: HashMap<Option<&str>, usize> = HashMap::new();
    let mut groups: Vec<GroupAccumulator> = Vec::new();
    for row in rows {
        let slot = *index.entry(row.dimension(group)).or_insert_with(|| {
            groups.push(GroupAccumulator::default());
            groups.len() - 1
        });
        groups[slot].add(row);
    }
    groups.into_iter().map(GroupAccumulator::finish).collect()
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Case- and accent-insensitive, so `Álvaro` sorts before `bruno`. The raw
/// text breaks ties. A missing value sorts first.
fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => normalize_name(a)
            .cmp(&normalize_name(b))
            .then_with(|| a.cmp(b)),
        _ => a.cmp(&b),
    }
}

fn compare_dimension(field: Field, a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    match field {
        Field::Period => compare_periods(&a.period, &b.period),
        _ => compare_text(a.dimension(field), b.dimension(field)),
    }
}

fn compare_rows(key: SortKey, group: Option<Field>, a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    match key {
        SortKey::Group => match group {
            Some(field) => compare_dimension(field, a, b),
            None => compare_periods(&a.period, &b.period)
                .then_with(|| compare_dimension(Field::Player, a, b)),
        },
        SortKey::Player => compare_dimension(Field::Player, a, b),
        SortKey::Period => compare_dimension(Field::Period, a, b),
        SortKey::Category => compare_dimension(Field::Category, a, b),
        SortKey::MetricValue => a.metric_value.total_cmp(&b.metric_value),
        SortKey::ZScore => a.z_score.total_cmp(&b.z_score),
        SortKey::TScore => a.t_score.total_cmp(&b.t_score),
    }
}

fn sort_rows(rows: &mut [ScoredRecord], sort: SortPolicy, group: Option<Field>) {
    rows.sort_by(|a, b| {
        let ordering = compare_rows(sort.key, group, a, b);
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

// ---------------------------------------------------------------------------
// Top-level entry point
// ---------------------------------------------------------------------------

/// Score every record of `dataset` per `request`.
///
/// Steps:
/// 1. Resolve the metric and group fields against the dataset schema.
/// 2. Compute reference statistics for the requested policy.
/// 3. Score each record against its reference population.
/// 4. Keep only records passing the filter (statistics are not affected).
/// 5. Aggregate by the group field, if any.
/// 6. Sort.
///
/// An empty dataset or an empty selection yields `Ok(vec![])`. Only an
/// unknown or misused field name is an error.
pub fn compute_scores(
    dataset: &Dataset,
    request: &ScoreRequest,
) -> Result<Vec<ScoredRecord>, ScoreError> {
    // ---- 1. Fields ----
    let metric = resolve_field(dataset, &request.metric_field)?;
    if metric != Field::MetricValue {
        return Err(ScoreError::InvalidField {
            field: request.metric_field.clone(),
            role: FieldRole::Metric,
        });
    }
    let group = match &request.group_field {
        Some(name) => {
            let field = resolve_field(dataset, name)?;
            if !field.is_dimension() {
                return Err(ScoreError::InvalidField {
                    field: name.clone(),
                    role: FieldRole::Group,
                });
            }
            Some(field)
        }
        None => None,
    };

    if dataset.is_empty() {
        debug!("dataset is empty; nothing to score");
        return Ok(Vec::new());
    }

    // ---- 2. Reference statistics ----
    let reference = reference_stats(dataset, &request.filter, request.reference_policy);
    debug!(
        policy = %request.reference_policy,
        "reference statistics: {:?}",
        reference
    );

    // ---- 3+4. Score, then select ----
    let scored: Vec<ScoredRecord> = dataset
        .records
        .iter()
        .filter(|record| request.filter.matches(record))
        .map(|record| ScoredRecord::from_record(record, &reference.for_period(&record.period)))
        .collect();

    // ---- 5. Aggregate ----
    let mut rows = match group {
        Some(field) => aggregate(&scored, field),
        None => scored,
    };

    // ---- 6. Sort ----
    sort_rows(&mut rows, request.sort, group);

    debug!(
        "scored {} of {} records into {} rows",
        rows.iter().map(|r| r.records).sum::<usize>(),
        dataset.len(),
        rows.len()
    );
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn rec(player: &str, period: &str, category: Option<&str>, value: f64) -> Record {
        Record {
            player: player.into(),
            period: period.into(),
            category: category.map(Into::into),
            metric_value: value,
        }
    }

    fn find<'a>(rows: &'a [ScoredRecord], player: &str, period: &str) -> &'a ScoredRecord {
        rows.iter()
            .find(|r| r.player == player && r.period == period)
            .unwrap_or_else(|| panic!("no row for {player}/{period}"))
    }

    /// Two periods with different spreads, two categories.
    fn squad() -> Dataset {
        Dataset::from_records(vec![
            rec("Ana", "ENERO", Some("Sub-18"), 60.0),
            rec("Luis", "ENERO", Some("Sub-16"), 80.0),
            rec("Eva", "ENERO", Some("Sub-18"), 100.0),
            rec("Ana", "FEBRERO", Some("Sub-18"), 70.0),
            rec("Luis", "FEBRERO", Some("Sub-16"), 90.0),
            rec("Eva", "FEBRERO", Some("Sub-18"), 140.0),
        ])
    }

    // ---- Scenarios ----

    #[test]
    fn global_three_records() {
        let dataset = Dataset::from_records(vec![
            rec("P1", "Jan", None, 10.0),
            rec("P2", "Jan", None, 20.0),
            rec("P3", "Jan", None, 30.0),
        ]);
        let request = ScoreRequest::new("metric_value", ReferencePolicy::Global);
        let rows = compute_scores(&dataset, &request).unwrap();
        assert_eq!(rows.len(), 3);

        let p1 = find(&rows, "P1", "Jan");
        let p2 = find(&rows, "P2", "Jan");
        let p3 = find(&rows, "P3", "Jan");
        assert!(approx_eq(p1.z_score, -1.2247, 1e-4));
        assert_eq!(p2.z_score, 0.0);
        assert!(approx_eq(p3.z_score, 1.2247, 1e-4));
        assert!(approx_eq(p1.t_score, 37.75, 1e-2));
        assert!(approx_eq(p3.t_score, 62.25, 1e-2));
    }

    #[test]
    fn single_record_is_degenerate() {
        let dataset = Dataset::from_records(vec![rec("P1", "Jan", None, 15.0)]);
        for policy in [
            ReferencePolicy::Global,
            ReferencePolicy::PerPeriod,
            ReferencePolicy::SelectedPeriods,
        ] {
            let rows = compute_scores(&dataset, &ScoreRequest::new("metric_value", policy)).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].z_score, 0.0);
            assert_eq!(rows[0].t_score, 50.0);
        }
    }

    #[test]
    fn huge_metric_values_score_fifty_not_nan() {
        let dataset = Dataset::from_records(vec![
            rec("A", "Jan", None, 1e308),
            rec("B", "Jan", None, 1.5e308),
        ]);
        for policy in [
            ReferencePolicy::Global,
            ReferencePolicy::PerPeriod,
            ReferencePolicy::SelectedPeriods,
        ] {
            let rows = compute_scores(&dataset, &ScoreRequest::new("metric_value", policy)).unwrap();
            assert_eq!(rows.len(), 2);
            for row in &rows {
                assert_eq!(row.z_score, 0.0, "policy {policy}");
                assert_eq!(row.t_score, 50.0);
            }
        }
    }

    #[test]
    fn constant_population_scores_fifty() {
        let dataset = Dataset::from_records(vec![
            rec("A", "Jan", None, 90.0),
            rec("B", "Jan", None, 90.0),
            rec("C", "Jan", None, 90.0),
        ]);
        let rows = compute_scores(&dataset, &ScoreRequest::default()).unwrap();
        assert!(rows.iter().all(|r| r.z_score == 0.0 && r.t_score == 50.0));
    }

    #[test]
    fn period_with_no_records_returns_empty() {
        let request = ScoreRequest::new("metric_value", ReferencePolicy::PerPeriod)
            .filtered(FilterSpec::default().with_periods(["JULIO"]));
        let rows = compute_scores(&squad(), &request).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_dataset_returns_empty() {
        let dataset = Dataset::from_records(Vec::new());
        let rows = compute_scores(&dataset, &ScoreRequest::default().group_by("player")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn unknown_metric_is_missing_column() {
        let request = ScoreRequest::new("NONEXISTENT", ReferencePolicy::Global);
        match compute_scores(&squad(), &request).unwrap_err() {
            ScoreError::MissingColumn(err) => {
                assert_eq!(err.missing, vec!["NONEXISTENT"]);
                assert!(err.found.contains(&"metric_value".to_string()));
            }
            other => panic!("expected MissingColumn, got: {other}"),
        }
    }

    #[test]
    fn missing_column_reports_raw_headers() {
        let table = crate::dataset::load_table_from_reader(
            "JUGADOR,MES,RM SENTADILLA\nAna,ENERO,80\n".as_bytes(),
        )
        .unwrap();
        let dataset = crate::dataset::normalize(&table, &crate::schema::AliasTable::default()).unwrap();
        let request = ScoreRequest::default().group_by("category");
        match compute_scores(&dataset, &request).unwrap_err() {
            ScoreError::MissingColumn(err) => {
                assert_eq!(err.missing, vec!["category"]);
                assert_eq!(err.found, vec!["JUGADOR", "MES", "RM SENTADILLA"]);
            }
            other => panic!("expected MissingColumn, got: {other}"),
        }
    }

    #[test]
    fn metric_alias_accepted() {
        let request = ScoreRequest::new("RM SENTADILLA", ReferencePolicy::Global);
        assert_eq!(compute_scores(&squad(), &request).unwrap().len(), 6);
    }

    #[test]
    fn dimension_as_metric_is_invalid() {
        let request = ScoreRequest::new("JUGADOR", ReferencePolicy::Global);
        assert_eq!(
            compute_scores(&squad(), &request).unwrap_err(),
            ScoreError::InvalidField {
                field: "JUGADOR".into(),
                role: FieldRole::Metric,
            }
        );
    }

    #[test]
    fn metric_as_group_is_invalid() {
        let request = ScoreRequest::default().group_by("metric_value");
        assert!(matches!(
            compute_scores(&squad(), &request).unwrap_err(),
            ScoreError::InvalidField { role: FieldRole::Group, .. }
        ));
    }

    #[test]
    fn group_by_absent_category_is_missing_column() {
        let mut dataset = squad();
        dataset.schema = dataset
            .aliases
            .resolve_headers(&[
                "player".to_string(),
                "period".to_string(),
                "metric_value".to_string(),
            ]);
        let request = ScoreRequest::default().group_by("category");
        assert!(matches!(
            compute_scores(&dataset, &request).unwrap_err(),
            ScoreError::MissingColumn(_)
        ));
    }

    // ---- Reference policies ----

    #[test]
    fn per_period_uses_each_period_separately() {
        let rows = compute_scores(
            &squad(),
            &ScoreRequest::new("metric_value", ReferencePolicy::PerPeriod),
        )
        .unwrap();
        // ENERO: mean 80, stdev sqrt(800/3)
        let stdev = (800.0_f64 / 3.0).sqrt();
        let ana = find(&rows, "Ana", "ENERO");
        assert!(approx_eq(ana.z_score, -20.0 / stdev, 1e-12));
        // FEBRERO population sums to zero on its own
        let feb_sum: f64 = rows
            .iter()
            .filter(|r| r.period == "FEBRERO")
            .map(|r| r.z_score)
            .sum();
        assert!(approx_eq(feb_sum, 0.0, 1e-9));
    }

    #[test]
    fn global_ignores_period_filter() {
        let all = compute_scores(&squad(), &ScoreRequest::new("metric_value", ReferencePolicy::Global))
            .unwrap();
        let january = compute_scores(
            &squad(),
            &ScoreRequest::new("metric_value", ReferencePolicy::Global)
                .filtered(FilterSpec::default().with_periods(["ENERO"])),
        )
        .unwrap();
        assert_eq!(january.len(), 3);
        for row in &january {
            assert_eq!(row, find(&all, &row.player, &row.period));
        }
    }

    #[test]
    fn selected_periods_narrowed_by_period_filter_only() {
        let base = ScoreRequest::new("metric_value", ReferencePolicy::SelectedPeriods);
        let january = compute_scores(
            &squad(),
            &base.clone().filtered(FilterSpec::default().with_periods(["ENERO"])),
        )
        .unwrap();
        let global = compute_scores(&squad(), &ScoreRequest::new("metric_value", ReferencePolicy::Global))
            .unwrap();
        // Pooled over January only, so it matches per-period for January...
        let per_period = compute_scores(
            &squad(),
            &ScoreRequest::new("metric_value", ReferencePolicy::PerPeriod),
        )
        .unwrap();
        let ana = find(&january, "Ana", "ENERO");
        assert!(approx_eq(ana.z_score, find(&per_period, "Ana", "ENERO").z_score, 1e-12));
        // ...and differs from the whole-dataset baseline.
        assert!(!approx_eq(ana.z_score, find(&global, "Ana", "ENERO").z_score, 1e-6));

        // Adding a player selection does not move anyone's score.
        let january_ana = compute_scores(
            &squad(),
            &base.filtered(
                FilterSpec::default()
                    .with_periods(["ENERO"])
                    .with_players(["Ana"]),
            ),
        )
        .unwrap();
        assert_eq!(january_ana.len(), 1);
        assert_eq!(&january_ana[0], ana);
    }

    #[test]
    fn player_and_category_filters_never_change_scores() {
        for policy in [
            ReferencePolicy::Global,
            ReferencePolicy::PerPeriod,
            ReferencePolicy::SelectedPeriods,
        ] {
            let base = ScoreRequest::new("metric_value", policy);
            let all = compute_scores(&squad(), &base).unwrap();
            let narrowed = compute_scores(
                &squad(),
                &base.clone().filtered(
                    FilterSpec::default()
                        .with_players(["Ana", "Luis"])
                        .with_categories(["Sub-18"]),
                ),
            )
            .unwrap();
            assert_eq!(narrowed.len(), 2, "policy {policy}");
            for row in &narrowed {
                assert_eq!(row.player, "Ana");
                let full = find(&all, &row.player, &row.period);
                assert_eq!(row.z_score, full.z_score);
                assert_eq!(row.t_score, full.t_score);
            }
        }
    }

    // ---- Aggregation ----

    #[test]
    fn aggregate_by_player_means_scores() {
        let request = ScoreRequest::new("metric_value", ReferencePolicy::PerPeriod).group_by("player");
        let per_record = compute_scores(
            &squad(),
            &ScoreRequest::new("metric_value", ReferencePolicy::PerPeriod),
        )
        .unwrap();
        let rows = compute_scores(&squad(), &request).unwrap();
        assert_eq!(rows.len(), 3);

        // Default sort: ascending group key.
        let players: Vec<&str> = rows.iter().map(|r| r.player.as_str()).collect();
        assert_eq!(players, vec!["Ana", "Eva", "Luis"]);

        let eva = &rows[1];
        assert_eq!(eva.records, 2);
        assert!(approx_eq(eva.metric_value, 120.0, 1e-12));
        let expected_z =
            (find(&per_record, "Eva", "ENERO").z_score + find(&per_record, "Eva", "FEBRERO").z_score) / 2.0;
        assert!(approx_eq(eva.z_score, expected_z, 1e-12));
        assert_eq!(eva.period, "ENERO, FEBRERO");
        assert_eq!(eva.category.as_deref(), Some("Sub-18"));
    }

    #[test]
    fn aggregate_by_category_joins_players() {
        let request = ScoreRequest::new("metric_value", ReferencePolicy::Global)
            .group_by("categoria")
            .filtered(FilterSpec::default().with_periods(["ENERO"]));
        let rows = compute_scores(&squad(), &request).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category.as_deref(), Some("Sub-16"));
        assert_eq!(rows[0].player, "Luis");
        assert_eq!(rows[1].category.as_deref(), Some("Sub-18"));
        assert_eq!(rows[1].player, "Ana, Eva");
        assert_eq!(rows[1].records, 2);
    }

    #[test]
    fn t_score_identity_holds_everywhere() {
        for group in [None, Some("player"), Some("period"), Some("category")] {
            let mut request = ScoreRequest::new("metric_value", ReferencePolicy::Global);
            request.group_field = group.map(Into::into);
            for row in compute_scores(&squad(), &request).unwrap() {
                assert_eq!(row.t_score, row.z_score * 10.0 + 50.0);
            }
        }
    }

    // ---- Sorting ----

    #[test]
    fn default_order_is_period_then_player() {
        let rows = compute_scores(&squad(), &ScoreRequest::default()).unwrap();
        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.period.as_str(), r.player.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ENERO", "Ana"),
                ("ENERO", "Eva"),
                ("ENERO", "Luis"),
                ("FEBRERO", "Ana"),
                ("FEBRERO", "Eva"),
                ("FEBRERO", "Luis"),
            ]
        );
    }

    #[test]
    fn player_sort_ignores_accents_and_case() {
        let dataset = Dataset::from_records(vec![
            rec("Zoe", "ENERO", Some("sub-18"), 70.0),
            rec("Álvaro", "ENERO", Some("Sub-16"), 80.0),
            rec("bruno", "ENERO", Some("Juvenil"), 90.0),
        ]);
        let rows = compute_scores(&dataset, &ScoreRequest::default()).unwrap();
        let players: Vec<&str> = rows.iter().map(|r| r.player.as_str()).collect();
        assert_eq!(players, vec!["Álvaro", "bruno", "Zoe"]);

        let by_category = compute_scores(
            &dataset,
            &ScoreRequest::default().sorted(SortPolicy::new(SortKey::Category, SortDirection::Ascending)),
        )
        .unwrap();
        let categories: Vec<&str> = by_category
            .iter()
            .filter_map(|r| r.category.as_deref())
            .collect();
        assert_eq!(categories, vec!["Juvenil", "Sub-16", "sub-18"]);
    }

    #[test]
    fn descending_metric_sort() {
        let request = ScoreRequest::new("metric_value", ReferencePolicy::Global)
            .sorted(SortPolicy::new(SortKey::MetricValue, SortDirection::Descending));
        let rows = compute_scores(&squad(), &request).unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.metric_value).collect();
        assert_eq!(values, vec![140.0, 100.0, 90.0, 80.0, 70.0, 60.0]);
    }

    #[test]
    fn group_by_period_sorts_calendar_order() {
        let dataset = Dataset::from_records(vec![
            rec("Ana", "MARZO", None, 80.0),
            rec("Ana", "ENERO", None, 70.0),
            rec("Ana", "FEBRERO", None, 75.0),
        ]);
        let request = ScoreRequest::default().group_by("mes");
        let rows = compute_scores(&dataset, &request).unwrap();
        let periods: Vec<&str> = rows.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(periods, vec!["ENERO", "FEBRERO", "MARZO"]);
    }

    // ---- Purity ----

    #[test]
    fn repeated_calls_are_identical() {
        let dataset = squad();
        let request = ScoreRequest::new("metric_value", ReferencePolicy::PerPeriod)
            .group_by("player")
            .sorted(SortPolicy::new(SortKey::TScore, SortDirection::Descending));
        let first = compute_scores(&dataset, &request).unwrap();
        let second = compute_scores(&dataset, &request).unwrap();
        assert_eq!(first, second);
        assert_eq!(dataset.records, squad().records);
    }

    #[test]
    fn reference_stats_for_unknown_period_is_degenerate() {
        let stats = reference_stats(&squad(), &FilterSpec::default(), ReferencePolicy::PerPeriod);
        assert!(stats.for_period("JULIO").is_degenerate());
        assert_eq!(stats.for_period("ENERO").count, 3);
    }
}
