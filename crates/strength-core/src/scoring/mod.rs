// Score engine: filters, pool statistics, Z/T-scores.

pub mod engine;
pub mod filter;
pub mod stats;

pub use engine::{
    compute_scores, reference_stats, FieldRole, ReferencePolicy, ReferenceStats, ScoreError,
    ScoreRequest, ScoredRecord, SortDirection, SortKey, SortPolicy,
};
pub use filter::FilterSpec;
pub use stats::{compute_pool_stats, compute_zscore, t_score_from_z, PoolStats};
